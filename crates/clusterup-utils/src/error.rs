use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use clusterup_runner::RunnerError;

/// Library-level error type for a provisioning run.
///
/// Every fatal condition of the workflow surfaces as a `ProvisionError`. None of
/// them are caught and converted into a different outcome: the orchestrator
/// stops at the failing step and no rollback is attempted, since Terraform
/// state is the durable record of any partial infrastructure.
///
/// # Error Categories
///
/// | Category | Variants |
/// |----------|----------|
/// | Environment | `UnsupportedPlatform`, `UnsupportedProvider` |
/// | Credentials | `CredentialFailure` |
/// | Tool execution | `ToolInvocation`, `Runner` |
/// | Outputs | `OutputMissing` |
/// | Transfer | `TransferExhausted`, `Cancelled` |
/// | Configuration | `Config`, `Render` |
///
/// # Exit Code Mapping
///
/// Use [`to_exit_code()`](Self::to_exit_code) to map errors to CLI exit codes.
///
/// # Example
///
/// ```rust
/// use clusterup_utils::error::ProvisionError;
/// use clusterup_utils::exit_codes::ExitCode;
///
/// let err = ProvisionError::OutputMissing {
///     name: "cluster_id".to_string(),
/// };
/// assert_eq!(err.to_exit_code(), ExitCode::OUTPUT_MISSING);
/// assert!(err.display_for_user().contains("cluster_id"));
/// ```
///
/// Library code returns `ProvisionError` and does NOT call `std::process::exit()`.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Unsupported platform {os}/{arch}: {reason}")]
    UnsupportedPlatform {
        os: String,
        arch: String,
        reason: String,
    },

    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },

    #[error("Credential check failed")]
    CredentialFailure { output: String, expired: bool },

    #[error("{tool} {step} failed with exit code {code}")]
    ToolInvocation {
        tool: String,
        step: String,
        code: i32,
    },

    #[error("Required output '{name}' is empty")]
    OutputMissing { name: String },

    #[error("Upload of {archive} gave up after {attempts} attempt(s)")]
    TransferExhausted { archive: PathBuf, attempts: u32 },

    #[error("Interrupted during {during}")]
    Cancelled { during: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Environment,
    Credentials,
    ToolExecution,
    Network,
    FileSystem,
    Transfer,
    Interrupted,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Environment => write!(f, "Environment"),
            Self::Credentials => write!(f, "Credentials"),
            Self::ToolExecution => write!(f, "Tool Execution"),
            Self::Network => write!(f, "Network"),
            Self::FileSystem => write!(f, "File System"),
            Self::Transfer => write!(f, "Transfer"),
            Self::Interrupted => write!(f, "Interrupted"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [defaults], [tools], [handoff], [render] and [summary] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' option has specific format requirements."
            )),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "clusterup searches for .clusterup/config.toml starting from the current directory upward."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of the configuration file".to_string(),
                "Remove unknown sections or keys".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "infra_repo" | "extension_repo" => vec![
                    "Use the GitHub 'owner/name' form, e.g. clusterinthecloud/terraform".to_string(),
                ],
                "retry_interval_secs" => {
                    vec!["Use a positive number of seconds between upload attempts".to_string()]
                }
                "terraform_url_template" => vec![
                    "The template must contain both {version} and {platform}".to_string(),
                ],
                _ => vec![
                    "Check the documentation for valid values for this option".to_string(),
                    "Remove the option to use the default value".to_string(),
                ],
            },
            Self::NotFound { .. } => vec![
                "Check the path passed to --config".to_string(),
                "Omit --config to use discovery and built-in defaults".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Check read permissions on the current directory and its parents".to_string(),
                "Use --config <path> to specify the configuration file explicitly".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors rendering the provider variable file
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template {path} could not be read: {source}")]
    TemplateUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Template {path} has no '{placeholder}' to substitute")]
    PlaceholderMissing { path: PathBuf, placeholder: String },

    #[error("Public key {path} could not be read: {source}")]
    PublicKeyUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Public key {path} is empty")]
    PublicKeyEmpty { path: PathBuf },

    #[error("Variable file {path} could not be written: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors downloading or unpacking remote artifacts
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Could not unpack {what}: {reason}")]
    Extract { what: String, reason: String },

    #[error("Unexpected archive layout in {what}: {reason}")]
    UnexpectedLayout { what: String, reason: String },
}

impl UserFriendlyError for ProvisionError {
    fn user_message(&self) -> String {
        match self {
            Self::UnsupportedPlatform { reason, .. } => reason.clone(),
            Self::UnsupportedProvider { provider } => format!(
                "Provider '{provider}' is not supported (supported: {})",
                crate::types::Provider::supported().join(", ")
            ),
            Self::CredentialFailure { output, expired } => {
                if *expired {
                    format!("AWS credentials have expired:\n{}", output.trim_end())
                } else {
                    format!("AWS credential check failed:\n{}", output.trim_end())
                }
            }
            Self::ToolInvocation { tool, step, code } => {
                format!("'{tool} {step}' exited with code {code}")
            }
            Self::OutputMissing { name } => {
                format!("Terraform output '{name}' was empty after apply")
            }
            Self::TransferExhausted { archive, attempts } => format!(
                "Could not upload {} to the cluster after {attempts} attempt(s)",
                archive.display()
            ),
            Self::Cancelled { during } => format!("Interrupted during {during}"),
            Self::Config(err) => err.user_message(),
            Self::Runner(err) => err.to_string(),
            Self::Render(err) => err.to_string(),
            Self::Fetch(err) => err.to_string(),
            Self::Io(err) => format!("File system operation failed: {err}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::UnsupportedPlatform { .. } => Some(
                "A pinned Terraform release is downloaded for the host operating system.".to_string(),
            ),
            Self::UnsupportedProvider { .. } => Some(
                "Each provider needs its own Terraform variable template semantics.".to_string(),
            ),
            Self::CredentialFailure { .. } => Some(
                "Before provisioning, a read-only dry-run API call verifies the AWS credentials."
                    .to_string(),
            ),
            Self::ToolInvocation { .. } => Some(
                "No rollback is attempted; Terraform state records any infrastructure already created."
                    .to_string(),
            ),
            Self::OutputMissing { .. } => Some(
                "The cluster address and identifier are required to upload the Terraform state."
                    .to_string(),
            ),
            Self::TransferExhausted { .. } => Some(
                "The cluster may still be booting, or the key or network may be rejecting the copy."
                    .to_string(),
            ),
            Self::Cancelled { .. } => None,
            Self::Config(err) => err.context(),
            Self::Runner(_) => Some(
                "clusterup drives terraform, aws, ssh-keygen and scp as external programs.".to_string(),
            ),
            Self::Render(_) => Some(
                "The provider's terraform.tfvars template must contain the documented substitution points."
                    .to_string(),
            ),
            Self::Fetch(_) => None,
            Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::UnsupportedPlatform { .. } => vec![
                "Run the installer from Linux, macOS or FreeBSD".to_string(),
            ],
            Self::UnsupportedProvider { .. } => {
                vec!["Pass one of the supported providers, e.g. 'clusterup aws'".to_string()]
            }
            Self::CredentialFailure { expired: true, .. } => vec![
                "Refresh your AWS session (e.g. 'aws sso login')".to_string(),
                "Pass --profile to select a different credentials profile".to_string(),
            ],
            Self::CredentialFailure { expired: false, .. } => vec![
                "Check 'aws configure list' for the selected profile".to_string(),
                "Pass --region and --profile explicitly".to_string(),
            ],
            Self::ToolInvocation { .. } => vec![
                "Read the tool output above for the root cause".to_string(),
                "Re-run clusterup; the generated key pair is reused".to_string(),
            ],
            Self::OutputMissing { .. } => vec![
                "Run 'terraform output' in the provider directory to inspect the state".to_string(),
            ],
            Self::TransferExhausted { .. } => vec![
                "Increase --max-upload-attempts, or set it to 0 to retry until success".to_string(),
                "Check that the cluster's security group allows SSH from this host".to_string(),
            ],
            Self::Cancelled { .. } => vec![
                "Re-run clusterup to resume; existing infrastructure is tracked by Terraform state"
                    .to_string(),
            ],
            Self::Config(err) => err.suggestions(),
            Self::Runner(_) => vec![
                "Check that the program is installed and on PATH".to_string(),
            ],
            Self::Render(_) => vec![
                "Check --infra-repo and --infra-branch point at a compatible repository".to_string(),
                "Try --legacy-render for templates that predate structured rendering".to_string(),
            ],
            Self::Fetch(_) => vec![
                "Check network connectivity to github.com and releases.hashicorp.com".to_string(),
                "Check that the repository and branch exist".to_string(),
            ],
            Self::Io(_) => vec![
                "Check permissions on the directory clusterup runs in".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedPlatform { .. } | Self::UnsupportedProvider { .. } => {
                ErrorCategory::Environment
            }
            Self::CredentialFailure { .. } => ErrorCategory::Credentials,
            Self::ToolInvocation { .. } | Self::OutputMissing { .. } | Self::Runner(_) => {
                ErrorCategory::ToolExecution
            }
            Self::TransferExhausted { .. } => ErrorCategory::Transfer,
            Self::Cancelled { .. } => ErrorCategory::Interrupted,
            Self::Config(_) | Self::Render(_) => ErrorCategory::Configuration,
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl ProvisionError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// ```text
    /// Error: <user message>
    ///
    /// Context: <context if available>
    ///
    /// Suggestions:
    ///   • <suggestion 1>
    /// ```
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Whether this error belongs to the environment-unsupported class, which
    /// must fail before any network access.
    #[must_use]
    pub const fn is_environment_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform { .. } | Self::UnsupportedProvider { .. }
        )
    }
}
