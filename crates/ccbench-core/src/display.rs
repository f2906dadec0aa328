//! Per-algorithm display attributes handed to the rendering sink.
//!
//! The table is loaded from a JSON side file and resolved only when tables
//! are exported; the aggregation core never looks at it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::canonical_algorithm;

const FALLBACK_COLOR: &str = "black";

/// How one algorithm should be drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAttributes {
    pub color: String,
    /// Legend text; defaults to the canonical algorithm name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Algorithm → display attributes, keyed by canonical algorithm name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub algorithms: BTreeMap<String, DisplayAttributes>,
    #[serde(default = "default_fallback_color")]
    pub fallback_color: String,
}

fn default_fallback_color() -> String {
    FALLBACK_COLOR.to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let algorithms = [("RENO", "blue"), ("CUBIC", "green"), ("BBR", "red")]
            .into_iter()
            .map(|(name, color)| {
                (
                    name.to_string(),
                    DisplayAttributes {
                        color: color.to_string(),
                        label: None,
                    },
                )
            })
            .collect();
        Self {
            algorithms,
            fallback_color: default_fallback_color(),
        }
    }
}

impl DisplayConfig {
    /// Default location: `~/.ccbench/display.json`.
    pub fn default_path() -> PathBuf {
        Self::path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".ccbench").join("display.json")
    }

    /// Load from `path`, falling back to the built-in table when the file is
    /// absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(config) => config.canonicalized(),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unparsable display config {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Atomically write the table to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Attributes for `algorithm`, case-insensitively; unknown algorithms get
    /// the fallback colour and their own name as label.
    pub fn resolve(&self, algorithm: &str) -> DisplayAttributes {
        let canonical = canonical_algorithm(algorithm);
        let mut attrs = self
            .algorithms
            .get(&canonical)
            .cloned()
            .unwrap_or_else(|| DisplayAttributes {
                color: self.fallback_color.clone(),
                label: None,
            });
        attrs.label.get_or_insert(canonical);
        attrs
    }

    /// Re-key user-supplied entries by canonical algorithm name.
    fn canonicalized(self) -> Self {
        Self {
            algorithms: self
                .algorithms
                .into_iter()
                .map(|(name, attrs)| (canonical_algorithm(&name), attrs))
                .collect(),
            fallback_color: self.fallback_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_table() {
        let config = DisplayConfig::default();
        assert_eq!(config.resolve("reno").color, "blue");
        assert_eq!(config.resolve("CUBIC").color, "green");
        assert_eq!(config.resolve("Bbr").color, "red");
    }

    #[test]
    fn test_resolve_unknown_uses_fallback() {
        let attrs = DisplayConfig::default().resolve("vegas");
        assert_eq!(attrs.color, "black");
        assert_eq!(attrs.label.as_deref(), Some("VEGAS"));
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = TempDir::new().expect("tempdir");
        let path = DisplayConfig::path_in(tmp.path());

        let mut config = DisplayConfig::default();
        config.algorithms.insert(
            "VEGAS".to_string(),
            DisplayAttributes {
                color: "purple".to_string(),
                label: Some("Vegas".to_string()),
            },
        );
        config.save_to(&path).expect("save");

        let loaded = DisplayConfig::load_from(&path);
        assert_eq!(loaded, config);
        assert_eq!(loaded.resolve("vegas").label.as_deref(), Some("Vegas"));
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = DisplayConfig::load_from(&DisplayConfig::path_in(tmp.path()));
        assert_eq!(loaded, DisplayConfig::default());
    }

    #[test]
    fn test_load_garbage_gives_default() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("display.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(DisplayConfig::load_from(&path), DisplayConfig::default());
    }

    #[test]
    fn test_load_canonicalizes_keys() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("display.json");
        std::fs::write(&path, r#"{"algorithms": {"reno": {"color": "navy"}}}"#).unwrap();

        let loaded = DisplayConfig::load_from(&path);
        assert_eq!(loaded.resolve("RENO").color, "navy");
        assert_eq!(loaded.fallback_color, "black");
    }
}
