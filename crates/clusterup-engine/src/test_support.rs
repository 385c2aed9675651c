//! Fakes and fixture builders for exercising the workflow without network
//! access or real tools.

use async_trait::async_trait;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::download::Downloader;
use crate::error::{FetchError, RunnerError};
use crate::runner::{CommandSpec, ProcessOutput, ProcessRunner};

/// Public key written by [`ScriptedRunner`] when it fakes `ssh-keygen`.
pub const FAKE_PUBLIC_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIFakeKeyForTests clusterup@test";

/// Minimal AWS variable file with both substitution points.
pub const SAMPLE_TFVARS: &str = "private_key_path = \"~/.ssh/aws-key\"\n\nadmin_public_keys = <<EOF\nEOF\n\nregion = \"eu-west-1\"\n";

fn program_key(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map_or_else(|| program.to_string(), |n| n.to_string_lossy().into_owned())
}

#[derive(Default)]
struct Script {
    /// Keyed by program; first matching argument wins.
    by_arg: HashMap<String, Vec<(String, ProcessOutput)>>,
    sequences: HashMap<String, VecDeque<ProcessOutput>>,
    defaults: HashMap<String, ProcessOutput>,
    spawn_errors: Vec<String>,
}

/// [`ProcessRunner`] that records every command and answers from a script.
///
/// Unscripted commands succeed with empty output. Successful `ssh-keygen`
/// runs create the key files and successful `terraform init` runs create the
/// provider's `.terraform` directory, so later steps see what the real tools
/// would leave behind.
#[derive(Default)]
pub struct ScriptedRunner {
    script: Mutex<Script>,
    commands: Mutex<Vec<CommandSpec>>,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `program` with `output`.
    #[must_use]
    pub fn respond(self, program: &str, output: ProcessOutput) -> Self {
        self.script
            .lock()
            .unwrap()
            .defaults
            .insert(program.to_string(), output);
        self
    }

    /// Answer calls to `program` carrying `arg` with `output`.
    #[must_use]
    pub fn respond_when(self, program: &str, arg: &str, output: ProcessOutput) -> Self {
        self.script
            .lock()
            .unwrap()
            .by_arg
            .entry(program.to_string())
            .or_default()
            .push((arg.to_string(), output));
        self
    }

    /// Answer the next calls to `program` from `outputs`, then fall back.
    #[must_use]
    pub fn respond_sequence(self, program: &str, outputs: Vec<ProcessOutput>) -> Self {
        self.script
            .lock()
            .unwrap()
            .sequences
            .insert(program.to_string(), outputs.into());
        self
    }

    /// Every call to `program` exits with `code`.
    #[must_use]
    pub fn fail_program(self, program: &str, code: i32) -> Self {
        self.respond(program, ProcessOutput::failed(code, format!("{program} failed")))
    }

    /// Every call to `program` fails to spawn.
    #[must_use]
    pub fn spawn_error(self, program: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .spawn_errors
            .push(program.to_string());
        self
    }

    /// All commands run so far.
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }

    /// Commands run so far for one program.
    pub fn commands_for(&self, program: &str) -> Vec<CommandSpec> {
        self.commands()
            .into_iter()
            .filter(|c| program_key(&c.program_name()) == program)
            .collect()
    }

    /// Contents of the archive each `scp` call was given, read at call time.
    pub fn uploaded_payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().unwrap().clone()
    }

    fn snapshot_upload(&self, cmd: &CommandSpec) {
        let cwd = cmd.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        if let Some(archive) = cmd.args_lossy().iter().find(|a| a.ends_with(".tar.gz")) {
            let bytes = std::fs::read(cwd.join(archive)).unwrap_or_default();
            self.payloads.lock().unwrap().push(bytes);
        }
    }

    /// Program names in call order.
    pub fn programs(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|c| program_key(&c.program_name()))
            .collect()
    }

    fn answer(&self, program: &str, cmd: &CommandSpec) -> Option<ProcessOutput> {
        let mut script = self.script.lock().unwrap();
        if let Some(rules) = script.by_arg.get(program)
            && let Some((_, output)) = rules.iter().find(|(arg, _)| cmd.has_arg(arg))
        {
            return Some(output.clone());
        }
        if let Some(queue) = script.sequences.get_mut(program)
            && let Some(output) = queue.pop_front()
        {
            return Some(output);
        }
        script.defaults.get(program).cloned()
    }

    fn side_effects(program: &str, cmd: &CommandSpec) {
        let cwd = cmd.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        let args = cmd.args_lossy();
        match program {
            "ssh-keygen" => {
                if let Some(pos) = args.iter().position(|a| a == "-f")
                    && let Some(name) = args.get(pos + 1)
                {
                    std::fs::write(cwd.join(name), "FAKE PRIVATE KEY\n").unwrap();
                    std::fs::write(cwd.join(format!("{name}.pub")), format!("{FAKE_PUBLIC_KEY}\n"))
                        .unwrap();
                }
            }
            "terraform" if cmd.has_arg("init") => {
                if let Some(dir) = args.iter().find_map(|a| a.strip_prefix("-chdir=")) {
                    let plugins = cwd.join(dir).join(".terraform");
                    std::fs::create_dir_all(&plugins).unwrap();
                    std::fs::write(plugins.join("plugin.bin"), "provider plugin").unwrap();
                }
            }
            _ => {}
        }
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(
        &self,
        cmd: &CommandSpec,
        _timeout: Option<Duration>,
    ) -> Result<ProcessOutput, RunnerError> {
        self.commands.lock().unwrap().push(cmd.clone());
        let program = program_key(&cmd.program_name());
        if program == "scp" {
            self.snapshot_upload(cmd);
        }

        if self.script.lock().unwrap().spawn_errors.contains(&program) {
            return Err(RunnerError::SpawnFailed {
                program,
                reason: "No such file or directory".to_string(),
            });
        }

        let output = self
            .answer(&program, cmd)
            .unwrap_or_else(|| ProcessOutput::ok(Vec::new()));
        if output.success() {
            Self::side_effects(&program, cmd);
        }
        Ok(output)
    }
}

/// [`Downloader`] serving canned bodies and recording requested URLs.
#[derive(Default)]
pub struct StaticDownloader {
    bodies: HashMap<String, Vec<u8>>,
    fallback: Option<Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl StaticDownloader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    /// Body for any URL without a specific entry.
    #[must_use]
    pub fn with_default(mut self, body: Vec<u8>) -> Self {
        self.fallback = Some(body);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for StaticDownloader {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Gzip tarball holding `entries` as regular files.
#[must_use]
pub fn tarball_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Tarball shaped like a GitHub branch archive: a pax global header and a
/// single `root/` directory with `aws/terraform.tfvars`.
#[must_use]
pub fn infra_tarball(root: &str, tfvars: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let pax = b"52 comment=0123456789abcdef0123456789abcdef01234567\n";
    let mut header = tar::Header::new_ustar();
    header.set_entry_type(tar::EntryType::XGlobalHeader);
    header.set_size(pax.len() as u64);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, "pax_global_header", &pax[..])
        .unwrap();

    for (path, data) in [
        (format!("{root}/README.md"), "Cluster in the Cloud\n"),
        (format!("{root}/aws/terraform.tfvars"), tfvars),
        (format!("{root}/aws/main.tf"), "terraform {}\n"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, data.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Zip archive holding `entries`.
#[must_use]
pub fn zip_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o755);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Zip shaped like a Terraform release.
#[must_use]
pub fn terraform_release_zip() -> Vec<u8> {
    zip_with_entries(&[("terraform", &b"#!/bin/sh\nexit 0\n"[..])])
}

/// Lay out `base_dir/citc-terraform` as it looks after init: key pair,
/// rendered variables, and a plugin cache.
pub fn sample_work_tree(base_dir: &Path) -> PathBuf {
    let work = base_dir.join(crate::WORK_DIR_NAME);
    let aws = work.join("aws");
    std::fs::create_dir_all(aws.join(".terraform").join("providers")).unwrap();
    std::fs::write(aws.join(".terraform").join("providers").join("aws"), "plugin").unwrap();
    std::fs::write(aws.join("terraform.tfvars"), SAMPLE_TFVARS).unwrap();
    std::fs::write(work.join(crate::KEY_FILE_NAME), "FAKE PRIVATE KEY\n").unwrap();
    std::fs::write(
        work.join(format!("{}.pub", crate::KEY_FILE_NAME)),
        FAKE_PUBLIC_KEY,
    )
    .unwrap();
    work
}

/// Entry paths of a gzip tarball on disk.
pub fn archive_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive
        .entries()
        .unwrap()
        .map(|entry| entry.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}
