use std::time::Duration;

use clusterup_utils::error::ConfigError;
use clusterup_utils::types::RenderMode;

use super::{Config, ConfigSource};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use clusterup_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .infra_branch("develop")
    ///     .retry_interval(Duration::from_secs(1))
    ///     .max_upload_attempts(3)
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.max_upload_attempts(), Some(3));
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for programmatic configuration.
///
/// All values set via the builder are attributed to `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    fn set(mut self, key: &str, apply: impl FnOnce(&mut Config)) -> Self {
        apply(&mut self.config);
        self.config
            .source_attribution
            .insert(key.to_string(), ConfigSource::Programmatic);
        self
    }

    #[must_use]
    pub fn infra_repo(self, repo: impl Into<String>) -> Self {
        let repo = repo.into();
        self.set("infra_repo", |c| c.defaults.infra_repo = Some(repo))
    }

    #[must_use]
    pub fn infra_branch(self, branch: impl Into<String>) -> Self {
        let branch = branch.into();
        self.set("infra_branch", |c| c.defaults.infra_branch = Some(branch))
    }

    #[must_use]
    pub fn terraform_version(self, version: impl Into<String>) -> Self {
        let version = version.into();
        self.set("terraform_version", |c| {
            c.defaults.terraform_version = Some(version);
        })
    }

    #[must_use]
    pub fn terraform_url_template(self, template: impl Into<String>) -> Self {
        let template = template.into();
        self.set("terraform_url_template", |c| {
            c.tools.terraform_url_template = Some(template);
        })
    }

    #[must_use]
    pub fn infra_url_template(self, template: impl Into<String>) -> Self {
        let template = template.into();
        self.set("infra_url_template", |c| {
            c.tools.infra_url_template = Some(template);
        })
    }

    #[must_use]
    pub fn tool_timeout(self, timeout: Duration) -> Self {
        self.set("tool_timeout_secs", |c| {
            c.tools.tool_timeout_secs = Some(timeout.as_secs());
        })
    }

    #[must_use]
    pub fn remote_user(self, user: impl Into<String>) -> Self {
        let user = user.into();
        self.set("remote_user", |c| c.handoff.remote_user = Some(user))
    }

    #[must_use]
    pub fn retry_interval(self, interval: Duration) -> Self {
        self.set("retry_interval_secs", |c| {
            c.handoff.retry_interval_secs = Some(interval.as_secs());
        })
    }

    /// 0 retries until the upload succeeds.
    #[must_use]
    pub fn max_upload_attempts(self, attempts: u32) -> Self {
        self.set("max_attempts", |c| c.handoff.max_attempts = Some(attempts))
    }

    #[must_use]
    pub fn render_mode(self, mode: RenderMode) -> Self {
        self.set("render_mode", |c| c.render.mode = Some(mode))
    }

    #[must_use]
    pub fn verbose(self, verbose: bool) -> Self {
        self.set("verbose", |c| c.defaults.verbose = Some(verbose))
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
