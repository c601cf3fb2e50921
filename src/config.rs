//! Engine configuration.
//!
//! A plain struct with a `Default` impl, loadable from a TOML file and
//! overridable from the CLI.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LogriaError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Records per index block before rollover and finalization.
    pub cap: usize,
    /// Minimum fraction of matching positions for a message to join an
    /// existing drain cluster instead of starting a new one.
    pub drain_similarity_threshold: f64,
    /// Distinct children a drain-tree node tolerates before collapsing
    /// overflow branches onto a wildcard.
    pub drain_max_children: usize,
    /// Records kept before the requested scroll offset when rebuilding the
    /// scheduler's cached scroll window.
    pub cache_window_before: usize,
    /// Records kept after the requested offset + length in that window.
    pub cache_window_after: usize,
    /// How long a producer waits to place a frame on a full output queue
    /// before dropping it, in milliseconds. Plain millis rather than
    /// `Duration` so a TOML config can set it as a bare integer.
    pub output_send_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cap: 8192,
            drain_similarity_threshold: 0.5,
            drain_max_children: 100,
            cache_window_before: 5000,
            cache_window_after: 10_000,
            output_send_timeout_ms: 1000,
        }
    }
}

impl EngineConfig {
    pub fn output_send_timeout(&self) -> Duration {
        Duration::from_millis(self.output_send_timeout_ms)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, LogriaError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| LogriaError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| LogriaError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }
}
