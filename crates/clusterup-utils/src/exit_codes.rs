//! Exit code constants and error mapping for clusterup.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Cluster provisioned, or dry run simulated |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `UNSUPPORTED_ENVIRONMENT` | Unsupported host platform or provider |
//! | 4 | `CREDENTIAL_FAILURE` | Credential preflight failed |
//! | 70 | `TOOL_FAILURE` | An external tool exited non-zero or could not run |
//! | 71 | `OUTPUT_MISSING` | Terraform produced an empty required output |
//! | 75 | `TRANSFER_FAILED` | State upload gave up under a bounded retry policy |
//! | 130 | `INTERRUPTED` | Cancelled by the operator |

use crate::error::ProvisionError;

/// Exit codes matching the documented exit code table.
///
/// ```rust
/// use clusterup_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::UNSUPPORTED_ENVIRONMENT, ExitCode::from_i32(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - cluster provisioned or dry run simulated
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid or missing command-line arguments or config
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Unsupported host platform or cloud provider
    pub const UNSUPPORTED_ENVIRONMENT: ExitCode = ExitCode(3);

    /// Credential preflight failed
    pub const CREDENTIAL_FAILURE: ExitCode = ExitCode(4);

    /// External tool invocation failed
    pub const TOOL_FAILURE: ExitCode = ExitCode(70);

    /// Required Terraform output missing after apply
    pub const OUTPUT_MISSING: ExitCode = ExitCode(71);

    /// State upload exhausted its retry budget
    pub const TRANSFER_FAILED: ExitCode = ExitCode(75);

    /// Interrupted by the operator
    pub const INTERRUPTED: ExitCode = ExitCode(130);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl ProvisionError {
    /// Map this error to the appropriate CLI exit code.
    ///
    /// This is the single source of truth for CLI exit codes.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::UnsupportedPlatform { .. } | Self::UnsupportedProvider { .. } => {
                ExitCode::UNSUPPORTED_ENVIRONMENT
            }
            Self::CredentialFailure { .. } => ExitCode::CREDENTIAL_FAILURE,
            Self::ToolInvocation { .. } | Self::Runner(_) => ExitCode::TOOL_FAILURE,
            Self::OutputMissing { .. } => ExitCode::OUTPUT_MISSING,
            Self::TransferExhausted { .. } => ExitCode::TRANSFER_FAILED,
            Self::Cancelled { .. } => ExitCode::INTERRUPTED,
            Self::Render(_) | Self::Fetch(_) | Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, FetchError, RunnerError};
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_constants() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::UNSUPPORTED_ENVIRONMENT.as_i32(), 3);
        assert_eq!(ExitCode::CREDENTIAL_FAILURE.as_i32(), 4);
        assert_eq!(ExitCode::TOOL_FAILURE.as_i32(), 70);
        assert_eq!(ExitCode::OUTPUT_MISSING.as_i32(), 71);
        assert_eq!(ExitCode::TRANSFER_FAILED.as_i32(), 75);
        assert_eq!(ExitCode::INTERRUPTED.as_i32(), 130);
    }

    #[test]
    fn test_config_error_mapping() {
        let err = ProvisionError::Config(ConfigError::InvalidFile("bad".to_string()));
        assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
    }

    #[test]
    fn test_environment_mapping() {
        let err = ProvisionError::UnsupportedProvider {
            provider: "azure".to_string(),
        };
        assert_eq!(err.to_exit_code(), ExitCode::UNSUPPORTED_ENVIRONMENT);
    }

    #[test]
    fn test_tool_failure_mapping() {
        let spawn = ProvisionError::Runner(RunnerError::SpawnFailed {
            program: "terraform".to_string(),
            reason: "not found".to_string(),
        });
        let exit = ProvisionError::ToolInvocation {
            tool: "terraform".to_string(),
            step: "validate".to_string(),
            code: 1,
        };
        assert_eq!(spawn.to_exit_code(), ExitCode::TOOL_FAILURE);
        assert_eq!(exit.to_exit_code(), ExitCode::TOOL_FAILURE);
    }

    #[test]
    fn test_transfer_and_cancel_mapping() {
        let exhausted = ProvisionError::TransferExhausted {
            archive: PathBuf::from("citc-terraform.tar.gz"),
            attempts: 3,
        };
        let cancelled = ProvisionError::Cancelled {
            during: "upload".to_string(),
        };
        assert_eq!(exhausted.to_exit_code(), ExitCode::TRANSFER_FAILED);
        assert_eq!(cancelled.to_exit_code(), ExitCode::INTERRUPTED);
    }

    #[test]
    fn test_fetch_maps_to_internal() {
        let err = ProvisionError::Fetch(FetchError::Status {
            url: "https://example.invalid".to_string(),
            status: 404,
        });
        assert_eq!(err.to_exit_code(), ExitCode::INTERNAL);
    }

    #[test]
    fn test_exit_code_conversions() {
        let code: ExitCode = 71.into();
        assert_eq!(code, ExitCode::OUTPUT_MISSING);
        let raw: i32 = ExitCode::INTERRUPTED.into();
        assert_eq!(raw, 130);
    }
}
