//! Logging and observability infrastructure for clusterup
//!
//! Structured logs go to stderr through `tracing`; the operator-facing
//! progress lines and the final summary are printed to stdout by the CLI, so
//! `--json` output stays machine-readable.

use std::io::IsTerminal;
use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Check if colored log output should be used.
///
/// Returns true only if stderr is a terminal and `NO_COLOR` is not set.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Default filter directive when `RUST_LOG` is not set.
#[must_use]
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "clusterup=debug,clusterup_engine=debug,clusterup_runner=debug,info"
    } else {
        "clusterup=info,clusterup_engine=info,warn"
    }
}

/// Initialize the tracing subscriber.
///
/// * `verbose` - structured format with targets and span close timings
/// * `json` - emit one JSON object per event instead of the compact format
pub fn init_tracing(verbose: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_current_span(true),
            )
            .try_init()?;
    } else if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering one workflow step.
pub fn step_span(step: &str, provider: &str, dry_run: bool) -> tracing::Span {
    span!(
        Level::INFO,
        "provision_step",
        step = %step,
        provider = %provider,
        dry_run = dry_run,
    )
}

pub fn log_step_start(step: &str) {
    info!(step = %step, "Starting step");
}

pub fn log_step_complete(step: &str, status: &str, duration_ms: u128) {
    info!(
        step = %step,
        status = %status,
        duration_ms = duration_ms,
        "Step finished"
    );
}

pub fn log_step_error(step: &str, error: &str, duration_ms: u128) {
    error!(
        step = %step,
        error = %error,
        duration_ms = duration_ms,
        "Step failed; aborting run without rollback"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(default_filter(false)).is_ok());
        assert!(EnvFilter::try_new(default_filter(true)).is_ok());
    }

    #[test]
    fn test_step_span_without_subscriber() {
        let span = step_span("render", "aws", true);
        let _guard = span.enter();
        log_step_start("render");
        log_step_complete("render", "completed", 3);
        log_step_error("apply", "terraform apply failed", 10);
    }
}
