//! Configuration management for clusterup
//!
//! This module provides hierarchical configuration with discovery and precedence:
//! CLI > file > defaults.

mod builder;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use discovery::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use model::*;
pub use clusterup_utils::types::ConfigSource;

impl Config {
    /// Substitute `{version}` and `{platform}` into the Terraform download template.
    ///
    /// ```rust
    /// use clusterup_config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(
    ///     config.terraform_url("linux_amd64"),
    ///     "https://releases.hashicorp.com/terraform/1.0.3/terraform_1.0.3_linux_amd64.zip"
    /// );
    /// ```
    #[must_use]
    pub fn terraform_url(&self, platform: &str) -> String {
        self.terraform_url_template()
            .replace("{version}", self.terraform_version())
            .replace("{platform}", platform)
    }

    /// Substitute `{repo}` and `{branch}` into the infrastructure tarball template.
    #[must_use]
    pub fn infra_url(&self, repo: &str, branch: &str) -> String {
        self.infra_url_template()
            .replace("{repo}", repo)
            .replace("{branch}", branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infra_url_uses_repo_and_branch() {
        let config = Config::builder()
            .infra_repo("acme/terraform")
            .infra_branch("feature/x")
            .build()
            .unwrap();
        assert_eq!(
            config.infra_url(config.infra_repo(), config.infra_branch()),
            "https://github.com/acme/terraform/archive/feature/x.tar.gz"
        );
    }

    #[test]
    fn test_terraform_url_honours_version_override() {
        let mut config = Config::default();
        config.defaults.terraform_version = Some("1.5.7".to_string());
        assert_eq!(
            config.terraform_url("darwin_arm64"),
            "https://releases.hashicorp.com/terraform/1.5.7/terraform_1.5.7_darwin_arm64.zip"
        );
    }
}
