use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, IntoStaticStr};

use crate::error::ProvisionError;

/// Cloud provider the cluster is provisioned into.
///
/// This is a closed set: supporting a provider means shipping new template
/// semantics for its variable file, not just new values.
///
/// # Example
///
/// ```rust
/// use clusterup_utils::types::Provider;
///
/// let provider: Provider = "aws".parse().unwrap();
/// assert_eq!(provider.as_str(), "aws");
/// assert_eq!(provider.display_name(), "AWS");
/// assert!("gcp".parse::<Provider>().is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    Aws,
}

impl Provider {
    /// Identifier used on the command line and as the Terraform subdirectory.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Name shown to the operator.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Aws => "AWS",
        }
    }

    /// Directory inside the infrastructure repository holding this provider's
    /// Terraform configuration.
    #[must_use]
    pub fn terraform_dir(self) -> &'static str {
        self.as_str()
    }

    /// All supported providers, in CLI order.
    #[must_use]
    pub fn supported() -> Vec<&'static str> {
        use strum::IntoEnumIterator;
        Self::iter().map(Self::as_str).collect()
    }
}

impl FromStr for Provider {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            _ => Err(ProvisionError::UnsupportedProvider {
                provider: s.to_string(),
            }),
        }
    }
}

/// How the Terraform variable file is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RenderMode {
    /// Overrides replace an existing top-level assignment of the same key,
    /// otherwise they are appended.
    #[default]
    Structured,
    /// Overrides are always appended after the template text.
    Legacy,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structured" => Ok(Self::Structured),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!(
                "unknown render mode '{other}' (expected 'structured' or 'legacy')"
            )),
        }
    }
}

/// Source of a configuration value.
///
/// Indicates where a configuration value originated from in the precedence chain:
/// CLI arguments > config file > programmatic overrides > built-in defaults.
///
/// ```rust
/// use clusterup_utils::types::ConfigSource;
///
/// assert_eq!(ConfigSource::Cli.as_str(), "cli");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value loaded from a configuration file.
    Config,
    /// Value set through `Config::builder()`.
    Programmatic,
    /// Built-in default.
    Default,
}

impl ConfigSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        }
    }
}
