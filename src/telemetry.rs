//! Structured logging, backed by `tracing`.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading `RUST_LOG` (defaulting to
/// `info`). Call once, near process start.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Thin facade over `tracing` for call sites that want `logger.info("...")`
/// method-call ergonomics instead of the macro form.
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger;

impl Logger {
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }
}
