//! Debug artifact configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Controls whether intermediate images are written to disk.
///
/// Passed explicitly to every component that can emit artifacts; there is no
/// process-wide switch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebugConfig {
    /// Write intermediate images when true.
    #[serde(default)]
    pub enabled: bool,
    /// Directory receiving the artifacts. Created on first write.
    #[serde(default = "DebugConfig::default_dir")]
    pub dir: PathBuf,
}

impl DebugConfig {
    /// A configuration that writes artifacts into `dir`.
    pub fn enabled_in(dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            dir: dir.into(),
        }
    }

    fn default_dir() -> PathBuf {
        PathBuf::from("images/debug")
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: Self::default_dir(),
        }
    }
}
