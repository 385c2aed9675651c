//! Rendering of the provider's `terraform.tfvars`.
//!
//! The infrastructure repository ships a variable file with two documented
//! substitution points. Rendering fills those in, then adds an assignment for
//! every override the operator supplied.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::KEY_FILE_NAME;
use crate::error::RenderError;
use crate::orchestrator::ProvisionRequest;
use crate::types::{Provider, RenderMode};

/// Key path in the template replaced by the generated key's file name.
pub const KEY_PATH_PLACEHOLDER: &str = "~/.ssh/aws-key";
/// Heredoc opener after which the public key is inserted.
pub const PUBLIC_KEYS_MARKER: &str = "admin_public_keys = <<EOF";
/// Variable file inside the provider directory.
pub const TFVARS_FILE: &str = "terraform.tfvars";

static TOP_LEVEL_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)\s*=").unwrap());

static HEREDOC_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<-?([A-Za-z_][A-Za-z0-9_]*)\s*$").unwrap());

/// One `key = "value"` line added by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub value: String,
}

impl Assignment {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// HCL source line for this assignment.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{} = \"{}\"", self.key, escape_hcl(&self.value))
    }
}

/// A written variable file.
#[derive(Debug, Clone)]
pub struct RenderedConfig {
    pub path: PathBuf,
    pub contents: String,
    /// Assignments added, in the order they were applied.
    pub assignments: Vec<Assignment>,
}

/// Escape a value for a double-quoted HCL string.
#[must_use]
pub fn escape_hcl(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                escaped.push(c);
                escaped.push(c);
            }
            other => escaped.push(other),
        }
    }
    escaped
}

/// Assignments the request contributes, in file order.
#[must_use]
pub fn assignments_for(request: &ProvisionRequest) -> Vec<Assignment> {
    let mut assignments = Vec::new();
    match request.provider {
        Provider::Aws => {
            for (key, value) in [
                ("region", &request.region),
                ("availability_zone", &request.availability_zone),
                ("profile", &request.credential_profile),
            ] {
                if let Some(value) = value {
                    assignments.push(Assignment::new(key, value));
                }
            }
        }
    }
    for (key, value) in [
        ("ansible_repo", &request.extension_repo),
        ("ansible_branch", &request.extension_branch),
    ] {
        if let Some(value) = value {
            assignments.push(Assignment::new(key, value));
        }
    }
    assignments
}

/// Apply the required substitutions.
///
/// Returns the missing marker when the template lacks one.
pub fn apply_replacements(
    template: &str,
    provider: Provider,
    public_key: &str,
) -> Result<String, &'static str> {
    match provider {
        Provider::Aws => {
            if !template.contains(KEY_PATH_PLACEHOLDER) {
                return Err(KEY_PATH_PLACEHOLDER);
            }
            if !template.contains(PUBLIC_KEYS_MARKER) {
                return Err(PUBLIC_KEYS_MARKER);
            }
            let text = template.replace(KEY_PATH_PLACEHOLDER, KEY_FILE_NAME);
            Ok(text.replace(
                PUBLIC_KEYS_MARKER,
                &format!("{PUBLIC_KEYS_MARKER}\n{public_key}"),
            ))
        }
    }
}

/// Line indices of top-level assignments to `key`, skipping heredoc bodies
/// and indented lines.
fn top_level_lines(lines: &[String], key: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut heredoc: Option<String> = None;

    for (idx, line) in lines.iter().enumerate() {
        if let Some(tag) = &heredoc {
            if line.trim() == tag {
                heredoc = None;
            }
            continue;
        }
        if let Some(caps) = TOP_LEVEL_ASSIGNMENT.captures(line)
            && &caps[1] == key
        {
            found.push(idx);
        }
        if let Some(caps) = HEREDOC_OPEN.captures(line) {
            heredoc = Some(caps[1].to_string());
        }
    }
    found
}

/// Add `assignments` to `text` according to `mode`.
#[must_use]
pub fn apply_assignments(text: &str, assignments: &[Assignment], mode: RenderMode) -> String {
    let mut appended = Vec::new();
    let text = match mode {
        RenderMode::Legacy => {
            appended.extend(assignments.iter().map(Assignment::to_line));
            text.to_string()
        }
        RenderMode::Structured => {
            let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
            let mut dropped = vec![false; lines.len()];
            for assignment in assignments {
                let matches = top_level_lines(&lines, &assignment.key);
                match matches.split_first() {
                    Some((first, rest)) => {
                        lines[*first] = assignment.to_line();
                        for idx in rest {
                            dropped[*idx] = true;
                        }
                    }
                    None => appended.push(assignment.to_line()),
                }
            }
            lines
                .into_iter()
                .zip(dropped)
                .filter_map(|(line, drop)| (!drop).then_some(line))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    let mut output = text;
    for line in appended {
        output.push('\n');
        output.push_str(&line);
    }
    output
}

/// Render `template` for `request` without touching the filesystem.
pub fn render_text(
    template: &str,
    request: &ProvisionRequest,
    public_key: &str,
    mode: RenderMode,
) -> Result<(String, Vec<Assignment>), &'static str> {
    let replaced = apply_replacements(template, request.provider, public_key)?;
    let assignments = assignments_for(request);
    let contents = apply_assignments(&replaced, &assignments, mode);
    Ok((contents, assignments))
}

/// Read the public half of the key pair, trimmed.
pub fn read_public_key(path: &Path) -> Result<String, RenderError> {
    let text = std::fs::read_to_string(path).map_err(|source| RenderError::PublicKeyUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RenderError::PublicKeyEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(trimmed.to_string())
}

/// Render the variable file at `template_path` in place.
pub fn render(
    template_path: &Path,
    request: &ProvisionRequest,
    public_key: &str,
    mode: RenderMode,
) -> Result<RenderedConfig, RenderError> {
    let template =
        std::fs::read_to_string(template_path).map_err(|source| RenderError::TemplateUnreadable {
            path: template_path.to_path_buf(),
            source,
        })?;

    let (contents, assignments) =
        render_text(&template, request, public_key, mode).map_err(|placeholder| {
            RenderError::PlaceholderMissing {
                path: template_path.to_path_buf(),
                placeholder: placeholder.to_string(),
            }
        })?;

    std::fs::write(template_path, &contents).map_err(|source| RenderError::WriteFailed {
        path: template_path.to_path_buf(),
        source,
    })?;

    debug!(
        path = %template_path.display(),
        mode = %mode,
        assignments = assignments.len(),
        "Rendered variable file"
    );

    Ok(RenderedConfig {
        path: template_path.to_path_buf(),
        contents,
        assignments,
    })
}
