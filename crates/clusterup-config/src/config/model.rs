use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clusterup_utils::types::{ConfigSource, RenderMode};

/// Infrastructure repository fetched when none is given.
pub const DEFAULT_INFRA_REPO: &str = "clusterinthecloud/terraform";
/// Branch of the infrastructure repository fetched when none is given.
pub const DEFAULT_INFRA_BRANCH: &str = "master";
/// Pinned Terraform release.
pub const DEFAULT_TERRAFORM_VERSION: &str = "1.0.3";
/// `{version}` and `{platform}` are substituted; platform is e.g. `linux_amd64`.
pub const DEFAULT_TERRAFORM_URL_TEMPLATE: &str =
    "https://releases.hashicorp.com/terraform/{version}/terraform_{version}_{platform}.zip";
/// `{repo}` and `{branch}` are substituted.
pub const DEFAULT_INFRA_URL_TEMPLATE: &str = "https://github.com/{repo}/archive/{branch}.tar.gz";
/// Seconds between state upload attempts.
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 10;
/// Account on the management node that receives the state archive.
pub const DEFAULT_REMOTE_USER: &str = "citc";
/// Program prefix of the destroy command printed in the summary.
pub const DEFAULT_DESTROY_COMMAND: &str = "python destroy-citc.py";

/// Configuration for clusterup runs.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > config file > built-in defaults.
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// infra_repo = "clusterinthecloud/terraform"
/// infra_branch = "master"
/// terraform_version = "1.0.3"
///
/// [tools]
/// aws = "aws"
/// scp = "scp"
/// tool_timeout_secs = 3600
///
/// [handoff]
/// remote_user = "citc"
/// retry_interval_secs = 10
/// max_attempts = 0
///
/// [render]
/// mode = "structured"
///
/// [summary]
/// destroy_command = "python destroy-citc.py"
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub defaults: Defaults,
    pub tools: ToolsConfig,
    pub handoff: HandoffConfig,
    pub render: RenderConfig,
    pub summary: SummaryConfig,
    /// Config file the values were loaded from, if any.
    pub config_path: Option<PathBuf>,
    /// Source attribution for each setting.
    pub source_attribution: HashMap<String, ConfigSource>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub infra_repo: Option<String>,
    pub infra_branch: Option<String>,
    pub terraform_version: Option<String>,
    pub verbose: Option<bool>,
}

/// External program locations and download templates.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub terraform_url_template: Option<String>,
    pub infra_url_template: Option<String>,
    pub aws: Option<String>,
    pub ssh_keygen: Option<String>,
    pub scp: Option<String>,
    /// Per-invocation timeout. Unset means wait indefinitely.
    pub tool_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffConfig {
    pub remote_user: Option<String>,
    pub retry_interval_secs: Option<u64>,
    /// 0 retries until the copy succeeds.
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    pub mode: Option<RenderMode>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryConfig {
    pub destroy_command: Option<String>,
}

/// CLI arguments that participate in configuration precedence.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub infra_repo: Option<String>,
    pub infra_branch: Option<String>,
    pub verbose: Option<bool>,
    pub render_mode: Option<RenderMode>,
    pub max_upload_attempts: Option<u32>,
}

impl Config {
    #[must_use]
    pub fn infra_repo(&self) -> &str {
        self.defaults
            .infra_repo
            .as_deref()
            .unwrap_or(DEFAULT_INFRA_REPO)
    }

    #[must_use]
    pub fn infra_branch(&self) -> &str {
        self.defaults
            .infra_branch
            .as_deref()
            .unwrap_or(DEFAULT_INFRA_BRANCH)
    }

    #[must_use]
    pub fn terraform_version(&self) -> &str {
        self.defaults
            .terraform_version
            .as_deref()
            .unwrap_or(DEFAULT_TERRAFORM_VERSION)
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn terraform_url_template(&self) -> &str {
        self.tools
            .terraform_url_template
            .as_deref()
            .unwrap_or(DEFAULT_TERRAFORM_URL_TEMPLATE)
    }

    #[must_use]
    pub fn infra_url_template(&self) -> &str {
        self.tools
            .infra_url_template
            .as_deref()
            .unwrap_or(DEFAULT_INFRA_URL_TEMPLATE)
    }

    #[must_use]
    pub fn aws_program(&self) -> &str {
        self.tools.aws.as_deref().unwrap_or("aws")
    }

    #[must_use]
    pub fn ssh_keygen_program(&self) -> &str {
        self.tools.ssh_keygen.as_deref().unwrap_or("ssh-keygen")
    }

    #[must_use]
    pub fn scp_program(&self) -> &str {
        self.tools.scp.as_deref().unwrap_or("scp")
    }

    #[must_use]
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tools.tool_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn remote_user(&self) -> &str {
        self.handoff
            .remote_user
            .as_deref()
            .unwrap_or(DEFAULT_REMOTE_USER)
    }

    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(
            self.handoff
                .retry_interval_secs
                .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS),
        )
    }

    /// Maximum upload attempts; `None` means unbounded.
    #[must_use]
    pub fn max_upload_attempts(&self) -> Option<u32> {
        match self.handoff.max_attempts {
            None | Some(0) => None,
            Some(n) => Some(n),
        }
    }

    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.render.mode.unwrap_or_default()
    }

    #[must_use]
    pub fn destroy_command(&self) -> &str {
        self.summary
            .destroy_command
            .as_deref()
            .unwrap_or(DEFAULT_DESTROY_COMMAND)
    }
}
