//! Runtime configuration read from the environment.

use crate::geometry::DEFAULT_THUMBNAIL_WIDTH;
use crate::store::SnapshotStore;
use std::path::PathBuf;
use tracing::warn;

pub const CONTENT_DIR_VAR: &str = "STAGEPLOT_CONTENT_DIR";
pub const TMP_DIR_VAR: &str = "STAGEPLOT_TMP_DIR";
pub const THUMBNAIL_WIDTH_VAR: &str = "STAGEPLOT_THUMBNAIL_WIDTH";
pub const AUTO_PRINT_VAR: &str = "STAGEPLOT_AUTO_PRINT";

const DEFAULT_CONTENT_DIR: &str = "content";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Root of the content directory; snapshots live in `snapshots/` below it.
    pub content_dir: PathBuf,
    /// Where finished documents are written.
    pub tmp_dir: PathBuf,
    pub thumbnail_width: u32,
    pub auto_print: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from(DEFAULT_CONTENT_DIR),
            tmp_dir: std::env::temp_dir().join("stageplot"),
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            auto_print: false,
        }
    }
}

impl ExportConfig {
    /// Reads the `STAGEPLOT_*` variables. Invalid values are logged and
    /// replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let thumbnail_width = match value(THUMBNAIL_WIDTH_VAR) {
            None => defaults.thumbnail_width,
            Some(raw) => match raw.parse::<u32>() {
                Ok(width) if width > 0 => width,
                _ => {
                    warn!(
                        var = THUMBNAIL_WIDTH_VAR,
                        value = %raw,
                        default = defaults.thumbnail_width,
                        "Invalid thumbnail width; using default"
                    );
                    defaults.thumbnail_width
                }
            },
        };

        let auto_print = match value(AUTO_PRINT_VAR) {
            None => defaults.auto_print,
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                warn!(var = AUTO_PRINT_VAR, value = %raw, "Invalid flag; auto-print disabled");
                defaults.auto_print
            }),
        };

        Self {
            content_dir: value(CONTENT_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.content_dir),
            tmp_dir: value(TMP_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.tmp_dir),
            thumbnail_width,
            auto_print,
        }
    }

    pub fn snapshot_store(&self) -> SnapshotStore {
        SnapshotStore::in_content_dir(&self.content_dir)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ExportConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ExportConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.thumbnail_width, 300);
        assert!(!config.auto_print);
        assert_eq!(
            config.snapshot_store().dir(),
            PathBuf::from("content").join("snapshots")
        );
    }

    #[test]
    fn test_reads_all_variables() {
        let config = config_from(&[
            (CONTENT_DIR_VAR, "/srv/content"),
            (TMP_DIR_VAR, "/srv/tmp"),
            (THUMBNAIL_WIDTH_VAR, "450"),
            (AUTO_PRINT_VAR, "TRUE"),
        ]);
        assert_eq!(config.content_dir, PathBuf::from("/srv/content"));
        assert_eq!(config.tmp_dir, PathBuf::from("/srv/tmp"));
        assert_eq!(config.thumbnail_width, 450);
        assert!(config.auto_print);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            (THUMBNAIL_WIDTH_VAR, "wide"),
            (AUTO_PRINT_VAR, "maybe"),
            (CONTENT_DIR_VAR, "   "),
        ]);
        assert_eq!(config.thumbnail_width, 300);
        assert!(!config.auto_print);
        assert_eq!(config.content_dir, PathBuf::from("content"));

        assert_eq!(config_from(&[(THUMBNAIL_WIDTH_VAR, "0")]).thumbnail_width, 300);
    }
}
