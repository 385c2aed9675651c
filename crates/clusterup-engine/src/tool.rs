//! Retrieval of the pinned Terraform binary.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::download::Downloader;
use crate::error::{FetchError, ProvisionError};
use crate::platform::HostPlatform;
use crate::progress::Progress;

/// File name of the binary inside the release archive.
pub const TERRAFORM_BINARY: &str = "terraform";

/// Download the configured Terraform release for `platform` and unpack it
/// into `dest_dir`.
///
/// Returns the path of the executable, which is made owner-only (`0700`).
/// The archive is not checksum-verified.
pub async fn fetch_tool(
    downloader: &dyn Downloader,
    config: &Config,
    progress: &Progress,
    platform: &HostPlatform,
    dest_dir: &Path,
) -> Result<PathBuf, ProvisionError> {
    let url = config.terraform_url(&platform.release_suffix());
    progress.line("Downloading Terraform binary");
    info!(
        url = %url,
        version = %config.terraform_version(),
        platform = %platform,
        "Fetching Terraform"
    );

    let bytes = downloader.fetch(&url).await?;
    let binary = unpack_release(&bytes, dest_dir)?;
    make_owner_executable(&binary)?;
    Ok(binary)
}

fn unpack_release(bytes: &[u8], dest_dir: &Path) -> Result<PathBuf, FetchError> {
    let extract_err = |reason: String| FetchError::Extract {
        what: "Terraform release".to_string(),
        reason,
    };

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| extract_err(e.to_string()))?;
    archive
        .extract(dest_dir)
        .map_err(|e| extract_err(e.to_string()))?;

    let binary = dest_dir.join(TERRAFORM_BINARY);
    if !binary.is_file() {
        return Err(FetchError::UnexpectedLayout {
            what: "Terraform release".to_string(),
            reason: format!("archive did not contain '{TERRAFORM_BINARY}'"),
        });
    }
    Ok(binary)
}

#[cfg(unix)]
fn make_owner_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn make_owner_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
