//! Retrieval of the infrastructure repository tarball.

use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};

use crate::WORK_DIR_NAME;
use crate::config::Config;
use crate::download::Downloader;
use crate::error::{FetchError, ProvisionError};
use crate::progress::Progress;

/// Download `repo` at `branch` and normalise it to `base_dir/citc-terraform`.
///
/// Any previous `citc-terraform` directory is replaced. The tarball must hold
/// a single top-level directory, as GitHub archive downloads do.
pub async fn fetch_infra(
    downloader: &dyn Downloader,
    config: &Config,
    progress: &Progress,
    repo: &str,
    branch: &str,
    base_dir: &Path,
) -> Result<PathBuf, ProvisionError> {
    let url = config.infra_url(repo, branch);
    progress.line("Downloading CitC Terraform configuration");
    info!(url = %url, repo = %repo, branch = %branch, "Fetching infrastructure repository");

    let bytes = downloader.fetch(&url).await?;
    let root = single_root(&bytes)?;
    debug!(root = %root, "Infrastructure archive root");

    let work_dir = base_dir.join(WORK_DIR_NAME);
    remove_dir_if_present(&work_dir)?;
    let extracted = base_dir.join(&root);
    remove_dir_if_present(&extracted)?;

    let mut archive = Archive::new(GzDecoder::new(bytes.as_slice()));
    archive.unpack(base_dir).map_err(|e| FetchError::Extract {
        what: url.clone(),
        reason: e.to_string(),
    })?;

    if extracted != work_dir {
        std::fs::rename(&extracted, &work_dir)?;
    }
    Ok(work_dir)
}

/// Name of the only top-level directory in a gzip tarball.
fn single_root(bytes: &[u8]) -> Result<String, FetchError> {
    let extract_err = |reason: String| FetchError::Extract {
        what: "infrastructure archive".to_string(),
        reason,
    };

    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut roots = BTreeSet::new();
    for entry in archive.entries().map_err(|e| extract_err(e.to_string()))? {
        let entry = entry.map_err(|e| extract_err(e.to_string()))?;
        if entry.header().entry_type().is_pax_global_extensions() {
            continue;
        }
        let path = entry.path().map_err(|e| extract_err(e.to_string()))?;
        if let Some(Component::Normal(first)) = path.components().next() {
            roots.insert(first.to_string_lossy().into_owned());
        }
    }

    let mut roots = roots.into_iter();
    match (roots.next(), roots.next()) {
        (Some(root), None) => Ok(root),
        (None, _) => Err(FetchError::UnexpectedLayout {
            what: "infrastructure archive".to_string(),
            reason: "archive is empty".to_string(),
        }),
        (Some(first), Some(second)) => Err(FetchError::UnexpectedLayout {
            what: "infrastructure archive".to_string(),
            reason: format!("expected one top-level directory, found '{first}' and '{second}'"),
        }),
    }
}

pub(crate) fn remove_dir_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
