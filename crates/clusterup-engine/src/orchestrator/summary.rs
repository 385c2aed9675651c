use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use crate::types::Provider;

const BANNER_WIDTH: usize = 80;

/// What the operator needs after the run: how to log in and how to tear down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub provider: Provider,
    pub key_path: String,
    pub cluster_address: String,
    pub cluster_id: String,
    pub ssh_command: String,
    pub destroy_command: String,
    pub dry_run: bool,
}

impl Summary {
    /// `destroy_prefix` is the configured destroy program, emitted unquoted;
    /// every argument after it is shell-quoted when needed.
    #[must_use]
    pub fn new(
        provider: Provider,
        key_path: &Path,
        cluster_address: &str,
        cluster_id: &str,
        remote_user: &str,
        destroy_prefix: &str,
        dry_run: bool,
    ) -> Self {
        let key = key_path.to_string_lossy().into_owned();
        let ssh_command = format!(
            "ssh -i {} {}",
            shell_words::quote(&key),
            shell_words::quote(&format!("{remote_user}@{cluster_address}"))
        );
        let destroy_command = format!(
            "{destroy_prefix} {}",
            shell_words::join([provider.as_str(), cluster_address, key.as_str()])
        );

        Self {
            provider,
            key_path: key,
            cluster_address: cluster_address.to_string(),
            cluster_id: cluster_id.to_string(),
            ssh_command,
            destroy_command,
            dry_run,
        }
    }

    /// Closing banner printed after a successful run.
    #[must_use]
    pub fn banner(&self) -> String {
        let rule = "#".repeat(BANNER_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "The file '{}' will allow you to log into the new cluster",
            self.key_path
        );
        let _ = writeln!(
            out,
            "Make sure you save this key as it is needed to destroy the cluster later."
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "The IP address of the cluster is {}", self.cluster_address);
        let _ = writeln!(out, "Connect with:");
        let _ = writeln!(out, "  {}", self.ssh_command);
        let _ = writeln!(out);
        let _ = writeln!(out, "You can destroy the cluster with:");
        let _ = writeln!(out, "  {}", self.destroy_command);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Summary {
        Summary::new(
            Provider::Aws,
            Path::new("citc-terraform-test-cluster/citc-key"),
            "1.1.1.1",
            "test-cluster",
            "citc",
            "python destroy-citc.py",
            true,
        )
    }

    #[test]
    fn test_commands() {
        let summary = sample();
        assert_eq!(
            summary.ssh_command,
            "ssh -i citc-terraform-test-cluster/citc-key citc@1.1.1.1"
        );
        assert_eq!(
            summary.destroy_command,
            "python destroy-citc.py aws 1.1.1.1 citc-terraform-test-cluster/citc-key"
        );
    }

    #[test]
    fn test_key_with_space_is_quoted() {
        let summary = Summary::new(
            Provider::Aws,
            Path::new("my dir/citc-key"),
            "1.1.1.1",
            "x",
            "citc",
            "python destroy-citc.py",
            false,
        );
        assert_eq!(summary.ssh_command, "ssh -i 'my dir/citc-key' citc@1.1.1.1");
        assert!(summary.destroy_command.ends_with("1.1.1.1 'my dir/citc-key'"));
    }

    #[test]
    fn test_banner_layout() {
        let banner = sample().banner();
        let lines: Vec<&str> = banner.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "#".repeat(80));
        assert!(banner.contains("The IP address of the cluster is 1.1.1.1"));
        assert!(banner.contains("  python destroy-citc.py aws 1.1.1.1 "));
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["provider"], "aws");
        assert_eq!(json["cluster_id"], "test-cluster");
        assert_eq!(json["dry_run"], true);
    }
}
