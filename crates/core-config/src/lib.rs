//! Configuration loading and parsing.
//!
//! Parses `tether.toml`, extracting the two knobs the core consumes
//! read-only:
//!
//! * `[sync] max_lines` - line-count ceiling above which buffer content
//!   synchronization is suppressed entirely (performance valve for very
//!   large files).
//! * `[grid] fixed_cols` / `fixed_rows` - debug-only override pinning the
//!   grid dimensions instead of deriving them from the host surface.
//!
//! Unknown fields are ignored (TOML deserialization tolerance) so the file
//! can grow without breaking older builds; a file that fails to parse falls
//! back to defaults rather than aborting startup.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "SyncConfig::default_max_lines")]
    pub max_lines: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_lines: Self::default_max_lines(),
        }
    }
}

impl SyncConfig {
    const fn default_max_lines() -> usize {
        10_000
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct GridConfig {
    #[serde(default)]
    pub fixed_cols: Option<u16>,
    #[serde(default)]
    pub fixed_rows: Option<u16>,
}

impl GridConfig {
    /// Both dimensions pinned, or no override at all.
    pub fn fixed_dimensions(&self) -> Option<(u16, u16)> {
        match (self.fixed_cols, self.fixed_rows) {
            (Some(cols), Some(rows)) => Some((cols, rows)),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub grid: GridConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file string, kept for diagnostics.
    pub raw: Option<String>,
    pub file: ConfigFile,
}

/// Best-effort config path following platform conventions: working-directory
/// `tether.toml` first, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("tether.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("tether").join("tether.toml");
    }
    PathBuf::from("tether.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config {
                    raw: Some(content),
                    file,
                })
            }
            Err(err) => {
                warn!(target: "config", path = %path.display(), %err, "config_parse_failed_using_defaults");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_tether__.toml"))).unwrap();
        assert_eq!(cfg.file.sync.max_lines, 10_000);
        assert_eq!(cfg.file.grid.fixed_dimensions(), None);
    }

    #[test]
    fn parses_sync_ceiling_and_grid_override() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[sync]\nmax_lines = 2500\n[grid]\nfixed_cols = 120\nfixed_rows = 40\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.sync.max_lines, 2500);
        assert_eq!(cfg.file.grid.fixed_dimensions(), Some((120, 40)));
    }

    #[test]
    fn partial_grid_override_is_ignored() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[grid]\nfixed_cols = 120\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.grid.fixed_cols, Some(120));
        assert_eq!(cfg.file.grid.fixed_dimensions(), None);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[sync\nmax_lines = oops").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.sync.max_lines, 10_000);
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[sync]\nmax_lines = 100\nfuture_knob = true\n[theme]\nname = \"dusk\"\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.sync.max_lines, 100);
    }
}
