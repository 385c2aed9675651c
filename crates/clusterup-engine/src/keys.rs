//! Administrator key pair.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::KEY_FILE_NAME;
use crate::config::Config;
use crate::error::ProvisionError;
use crate::runner::{CommandSpec, ProcessRunner};

/// Private and public halves of the cluster's SSH key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private_path: PathBuf,
    pub public_path: PathBuf,
}

impl KeyPair {
    /// Key pair named `citc-key` / `citc-key.pub` in `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            private_path: dir.join(KEY_FILE_NAME),
            public_path: dir.join(format!("{KEY_FILE_NAME}.pub")),
        }
    }
}

/// Generate an unencrypted ed25519 key in `work_dir` unless the private key
/// already exists. An existing key is never regenerated.
pub fn ensure_key_pair(
    runner: &dyn ProcessRunner,
    config: &Config,
    work_dir: &Path,
) -> Result<KeyPair, ProvisionError> {
    let pair = KeyPair::in_dir(work_dir);
    if pair.private_path.is_file() {
        debug!(path = %pair.private_path.display(), "Reusing existing key pair");
        return Ok(pair);
    }

    info!(path = %pair.private_path.display(), "Generating ed25519 key pair");
    let cmd = CommandSpec::new(config.ssh_keygen_program())
        .args(["-t", "ed25519", "-f", KEY_FILE_NAME, "-N", ""])
        .cwd(work_dir)
        .inherit_output();

    let output = runner.run(&cmd, config.tool_timeout())?;
    if !output.success() {
        return Err(ProvisionError::ToolInvocation {
            tool: "ssh-keygen".to_string(),
            step: "key generation".to_string(),
            code: output.code_or_signal(),
        });
    }
    Ok(pair)
}
