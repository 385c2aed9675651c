//! CLI argument definitions (clap)

use clap::Parser;
use std::path::PathBuf;

/// clusterup - provision a Cluster in the Cloud and hand it its Terraform state
#[derive(Parser, Debug)]
#[command(name = "clusterup")]
#[command(about = "Provision a compute cluster in the cloud with Terraform")]
#[command(long_about = r#"
clusterup downloads the Cluster in the Cloud Terraform configuration and a pinned
Terraform release, generates an SSH key, creates the cluster and then copies the
Terraform state onto the management node so the cluster can manage itself.

EXAMPLES:
  # See what would happen without creating anything
  clusterup aws --dry-run

  # Create a cluster in a specific region with a named credential profile
  clusterup aws --region eu-west-1 --profile research

  # Use a fork of the infrastructure repository
  clusterup aws --infra-repo acme/terraform --infra-branch staging

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > config file > defaults
  Config file is discovered by searching upward from CWD for .clusterup/config.toml
  Use --config to specify an explicit config file path
"#)]
#[command(version)]
pub struct Cli {
    /// Cloud provider to provision into (aws)
    pub provider: String,

    /// Simulate the run: no credential check, no cloud resources, no upload
    #[arg(long)]
    pub dry_run: bool,

    /// Cloud region to create the cluster in
    #[arg(long)]
    pub region: Option<String>,

    /// Availability zone within the region
    #[arg(long, alias = "availability_zone")]
    pub availability_zone: Option<String>,

    /// Named credential profile for the cloud CLI
    #[arg(long)]
    pub profile: Option<String>,

    /// Infrastructure repository as OWNER/NAME
    #[arg(long, alias = "terraform-repo", value_name = "OWNER/NAME")]
    pub infra_repo: Option<String>,

    /// Branch of the infrastructure repository
    #[arg(long, alias = "terraform-branch")]
    pub infra_branch: Option<String>,

    /// Configuration-management repository the cluster should pull
    #[arg(long, alias = "ansible-repo")]
    pub extension_repo: Option<String>,

    /// Branch of the configuration-management repository
    #[arg(long, alias = "ansible-branch")]
    pub extension_branch: Option<String>,

    /// Path to configuration file (overrides discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit the run report as JSON instead of the closing banner
    #[arg(long)]
    pub json: bool,

    /// Append overrides to the variable file instead of replacing assignments
    #[arg(long)]
    pub legacy_render: bool,

    /// Give up uploading the state after N attempts (default: retry until success)
    #[arg(long, value_name = "N")]
    pub max_upload_attempts: Option<u32>,
}

/// Build the CLI command structure without parsing arguments
/// This is used for introspection in tests
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
