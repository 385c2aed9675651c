//! Operator-facing progress lines.
//!
//! Progress normally shares stdout with the closing banner. When stdout carries
//! the JSON report instead, the lines go to stderr so the document stays clean.

use std::fmt::Display;
use std::sync::{Arc, Mutex};

/// Where progress lines are written.
#[derive(Debug, Clone, Default)]
pub enum Progress {
    #[default]
    Stdout,
    Stderr,
    /// Kept in memory; read back with [`Progress::lines`].
    Captured(Arc<Mutex<Vec<String>>>),
}

impl Progress {
    /// Stderr when stdout is reserved for a machine-readable report.
    #[must_use]
    pub fn for_output(machine_readable: bool) -> Self {
        if machine_readable {
            Self::Stderr
        } else {
            Self::Stdout
        }
    }

    #[must_use]
    pub fn captured() -> Self {
        Self::Captured(Arc::default())
    }

    pub fn line(&self, message: impl Display) {
        match self {
            Self::Stdout => println!("{message}"),
            Self::Stderr => eprintln!("{message}"),
            Self::Captured(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(message.to_string());
                }
            }
        }
    }

    /// Captured lines so far; empty for the stream sinks.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Captured(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            Self::Stdout | Self::Stderr => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output_moves_progress_to_stderr() {
        assert!(matches!(Progress::for_output(true), Progress::Stderr));
        assert!(matches!(Progress::for_output(false), Progress::Stdout));
    }

    #[test]
    fn test_captured_clones_share_lines() {
        let progress = Progress::captured();
        let handle = progress.clone();
        progress.line("Downloading Terraform binary");
        progress.line(format_args!("attempt {}", 2));

        assert_eq!(handle.lines(), ["Downloading Terraform binary", "attempt 2"]);
        assert!(Progress::Stdout.lines().is_empty());
    }
}
