//! Host platform detection for the Terraform release download.

use std::fmt;

use crate::error::ProvisionError;

/// Operating system families with a published Terraform build.
pub const SUPPORTED_OS: &[&str] = &["linux", "darwin", "freebsd"];

/// Host operating system and CPU architecture, in Terraform release naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: String,
    pub arch: String,
}

impl HostPlatform {
    /// Platform of the running process.
    ///
    /// Fails for hosts without a Terraform release, before anything is downloaded.
    pub fn detect() -> Result<Self, ProvisionError> {
        Self::resolve(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust target names (`macos`, `x86_64`, ...) or Terraform names
    /// (`darwin`, `amd64`, ...) to a supported platform.
    pub fn resolve(os: &str, arch: &str) -> Result<Self, ProvisionError> {
        let unsupported = |reason: String| ProvisionError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
            reason,
        };

        let tf_os = match os {
            "linux" => "linux",
            "macos" | "darwin" => "darwin",
            "freebsd" => "freebsd",
            "windows" => {
                return Err(unsupported(
                    "Windows is not supported at the moment".to_string(),
                ));
            }
            other => return Err(unsupported(format!("Platform {other} is not supported"))),
        };

        let tf_arch = match arch {
            "x86_64" | "amd64" => "amd64",
            "aarch64" | "arm64" if tf_os != "freebsd" => "arm64",
            other => {
                return Err(unsupported(format!(
                    "Architecture {other} is not supported on {tf_os}"
                )));
            }
        };

        Ok(Self {
            os: tf_os.to_string(),
            arch: tf_arch.to_string(),
        })
    }

    /// `{os}_{arch}`, the platform segment of a release file name.
    #[must_use]
    pub fn release_suffix(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_amd64() {
        let platform = HostPlatform::resolve("linux", "x86_64").unwrap();
        assert_eq!(platform.release_suffix(), "linux_amd64");
    }

    #[test]
    fn test_macos_maps_to_darwin() {
        let platform = HostPlatform::resolve("macos", "aarch64").unwrap();
        assert_eq!(platform.release_suffix(), "darwin_arm64");
        assert_eq!(platform.to_string(), "darwin/arm64");
    }

    #[test]
    fn test_freebsd_arm64_rejected() {
        let err = HostPlatform::resolve("freebsd", "aarch64").unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedPlatform { .. }));
        assert!(HostPlatform::resolve("freebsd", "x86_64").is_ok());
    }

    #[test]
    fn test_windows_message() {
        match HostPlatform::resolve("windows", "x86_64").unwrap_err() {
            ProvisionError::UnsupportedPlatform { reason, .. } => {
                assert_eq!(reason, "Windows is not supported at the moment");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_os_message() {
        match HostPlatform::resolve("solaris", "x86_64").unwrap_err() {
            ProvisionError::UnsupportedPlatform { reason, .. } => {
                assert_eq!(reason, "Platform solaris is not supported");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
