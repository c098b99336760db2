//! Logger module
//!
//! Thin facade over `tracing`:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Error and warning logging
//! - Fatal startup diagnostics, written straight to stderr

mod format;

pub use format::AccessLogEntry;

use crate::config::LoggingConfig;
use nu_ansi_term::Color;
use std::net::SocketAddr;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level. Errors go to stderr, everything else to stdout.
///
/// Returns false when a subscriber was already installed.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = std::io::stderr
        .with_max_level(Level::ERROR)
        .or_else(std::io::stdout);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .with_ansi(color_enabled())
        .try_init()
        .is_ok()
}

/// Honour <https://no-color.org>
fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").map_or(true, |v| v.is_empty())
}

pub fn log_server_start(addr: &SocketAddr, entry: &str, convention: &str, static_dir: &str) {
    tracing::info!("Serving {entry} ({convention}) on http://{addr}");
    tracing::info!("Static files: {static_dir}");
}

pub fn log_route_prefix(prefix: &str) {
    if !prefix.is_empty() {
        tracing::info!("Stripping route prefix: {prefix}");
    }
}

pub fn log_shutdown() {
    tracing::info!("Shutting down");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_info(message: &str) {
    tracing::info!("{message}");
}

pub fn log_debug(message: &str) {
    tracing::debug!("{message}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "devroute::access", "{}", entry.format(format));
}

/// Report a startup failure. Printed directly since the subscriber may not
/// be installed yet.
pub fn fatal(message: &impl std::fmt::Display) {
    eprintln!("{}", fatal_line(message, color_enabled()));
}

fn fatal_line(message: &impl std::fmt::Display, color: bool) -> String {
    let line = format!("devroute: {message}");
    if color {
        Color::Red.bold().paint(line).to_string()
    } else {
        line
    }
}
