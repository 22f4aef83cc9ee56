//! Logging and tracing setup.
//!
//! All logs are written to **stderr**; stdout belongs to the host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: a full `tracing` filter (e.g. `duplocloud_provider=debug`)
//! - `TF_LOG`: the host's log level, used when `RUST_LOG` is unset
//!
//! ```bash
//! # Show debug logs for the provider only
//! RUST_LOG=duplocloud_provider=debug terraform apply
//!
//! # Let the host's level drive ours
//! TF_LOG=TRACE terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a host `TF_LOG` level to a `tracing` level directive.
///
/// `JSON` is the host's structured trace mode, so it maps to `trace`.
/// Unknown values yield `None`.
pub fn tf_log_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        _ => None,
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("TF_LOG")
            .ok()
            .and_then(|l| tf_log_level(&l))
            .unwrap_or(default_level);
        EnvFilter::new(level)
    })
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(env_filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Initialize the default logging subscriber.
///
/// Filters with `RUST_LOG`, then `TF_LOG`, then `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    subscriber("info").init();
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but `default_level` is used when neither
/// `RUST_LOG` nor `TF_LOG` is set.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this does not panic when a subscriber has
/// already been set, which makes it safe to call from tests.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}
