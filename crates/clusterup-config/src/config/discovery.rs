use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clusterup_utils::error::ConfigError;

use super::{
    CliArgs, Config, ConfigSource, Defaults, HandoffConfig, RenderConfig, SummaryConfig,
    ToolsConfig,
};

/// Directory searched for upward from the working directory.
pub const CONFIG_DIR_NAME: &str = ".clusterup";
/// File name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    tools: Option<ToolsConfig>,
    handoff: Option<HandoffConfig>,
    render: Option<RenderConfig>,
    summary: Option<SummaryConfig>,
}

/// Copy `value` into `target` when set, recording where it came from.
fn layer<T: Clone>(
    target: &mut Option<T>,
    value: Option<&T>,
    key: &str,
    source: &ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if let Some(value) = value {
        *target = Some(value.clone());
        attribution.insert(key.to_string(), source.clone());
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("failed to get current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        for key in [
            "infra_repo",
            "infra_branch",
            "terraform_version",
            "verbose",
            "retry_interval_secs",
            "max_attempts",
            "render_mode",
        ] {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .map_err(|e| ConfigError::InvalidFile(format!("{e:#}")))?;
            config.apply_file(file_config);
            config.config_path = Some(path.clone());
        }

        config.apply_cli(cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Search upward from `start_dir` for `.clusterup/config.toml`.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let parsed: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML in {}", path.display()))?;
        Ok(parsed)
    }

    fn apply_file(&mut self, file: TomlConfig) {
        let source = ConfigSource::Config;
        let attribution = &mut self.source_attribution;

        if let Some(d) = file.defaults {
            layer(
                &mut self.defaults.infra_repo,
                d.infra_repo.as_ref(),
                "infra_repo",
                &source,
                attribution,
            );
            layer(
                &mut self.defaults.infra_branch,
                d.infra_branch.as_ref(),
                "infra_branch",
                &source,
                attribution,
            );
            layer(
                &mut self.defaults.terraform_version,
                d.terraform_version.as_ref(),
                "terraform_version",
                &source,
                attribution,
            );
            layer(&mut self.defaults.verbose, d.verbose.as_ref(), "verbose", &source, attribution);
        }

        if let Some(t) = file.tools {
            layer(
                &mut self.tools.terraform_url_template,
                t.terraform_url_template.as_ref(),
                "terraform_url_template",
                &source,
                attribution,
            );
            layer(
                &mut self.tools.infra_url_template,
                t.infra_url_template.as_ref(),
                "infra_url_template",
                &source,
                attribution,
            );
            layer(&mut self.tools.aws, t.aws.as_ref(), "aws", &source, attribution);
            layer(
                &mut self.tools.ssh_keygen,
                t.ssh_keygen.as_ref(),
                "ssh_keygen",
                &source,
                attribution,
            );
            layer(&mut self.tools.scp, t.scp.as_ref(), "scp", &source, attribution);
            layer(
                &mut self.tools.tool_timeout_secs,
                t.tool_timeout_secs.as_ref(),
                "tool_timeout_secs",
                &source,
                attribution,
            );
        }

        if let Some(h) = file.handoff {
            layer(
                &mut self.handoff.remote_user,
                h.remote_user.as_ref(),
                "remote_user",
                &source,
                attribution,
            );
            layer(
                &mut self.handoff.retry_interval_secs,
                h.retry_interval_secs.as_ref(),
                "retry_interval_secs",
                &source,
                attribution,
            );
            layer(
                &mut self.handoff.max_attempts,
                h.max_attempts.as_ref(),
                "max_attempts",
                &source,
                attribution,
            );
        }

        if let Some(r) = file.render {
            layer(&mut self.render.mode, r.mode.as_ref(), "render_mode", &source, attribution);
        }

        if let Some(s) = file.summary {
            layer(
                &mut self.summary.destroy_command,
                s.destroy_command.as_ref(),
                "destroy_command",
                &source,
                attribution,
            );
        }
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let source = ConfigSource::Cli;
        let attribution = &mut self.source_attribution;

        layer(
            &mut self.defaults.infra_repo,
            cli.infra_repo.as_ref(),
            "infra_repo",
            &source,
            attribution,
        );
        layer(
            &mut self.defaults.infra_branch,
            cli.infra_branch.as_ref(),
            "infra_branch",
            &source,
            attribution,
        );
        // --verbose is a switch: only an explicit `true` overrides the file.
        if cli.verbose == Some(true) {
            layer(&mut self.defaults.verbose, Some(&true), "verbose", &source, attribution);
        }
        layer(&mut self.render.mode, cli.render_mode.as_ref(), "render_mode", &source, attribution);
        layer(
            &mut self.handoff.max_attempts,
            cli.max_upload_attempts.as_ref(),
            "max_attempts",
            &source,
            attribution,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterup_utils::types::RenderMode;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let config_dir = dir.join(CONFIG_DIR_NAME);
        fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(CONFIG_FILE_NAME);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::discover_from(temp.path(), &CliArgs::default()).unwrap();
        assert!(config.config_path.is_none());
        assert_eq!(config.infra_branch(), "master");
        assert_eq!(
            config.source_attribution.get("infra_branch"),
            Some(&ConfigSource::Default)
        );
    }

    #[test]
    fn test_discover_searches_upward() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "[defaults]\ninfra_branch = \"develop\"\n");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::discover_from(&nested, &CliArgs::default()).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.infra_branch(), "develop");
        assert_eq!(
            config.source_attribution.get("infra_branch"),
            Some(&ConfigSource::Config)
        );
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            "[defaults]\ninfra_repo = \"acme/terraform\"\n\n[render]\nmode = \"legacy\"\n\n[handoff]\nmax_attempts = 3\n",
        );
        let cli = CliArgs {
            infra_repo: Some("me/fork".to_string()),
            max_upload_attempts: Some(0),
            ..CliArgs::default()
        };

        let config = Config::discover_from(temp.path(), &cli).unwrap();
        assert_eq!(config.infra_repo(), "me/fork");
        assert_eq!(config.render_mode(), RenderMode::Legacy);
        assert_eq!(config.max_upload_attempts(), None);
        assert_eq!(
            config.source_attribution.get("infra_repo"),
            Some(&ConfigSource::Cli)
        );
        assert_eq!(
            config.source_attribution.get("render_mode"),
            Some(&ConfigSource::Config)
        );
    }

    #[test]
    fn test_unknown_section_is_invalid_file() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[selectors]\ninclude = []\n");
        let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFile(_)), "got {err:?}");
    }

    #[test]
    fn test_explicit_missing_path_is_not_found() {
        let temp = TempDir::new().unwrap();
        let cli = CliArgs {
            config_path: Some(temp.path().join("nope.toml")),
            ..CliArgs::default()
        };
        let err = Config::discover_from(temp.path(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }), "got {err:?}");
    }

    #[test]
    fn test_invalid_value_rejected_after_layering() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[handoff]\nretry_interval_secs = 0\n");
        let err = Config::discover_from(temp.path(), &CliArgs::default()).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "retry_interval_secs"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
