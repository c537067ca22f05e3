use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable naming an optional JSON settings file.
pub const CONFIG_ENV: &str = "EDA_PANDA_CONFIG";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User-tunable limits. Missing keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Largest header-row index offered for workbooks.
    pub max_header_row: usize,
    /// Rows shown by "View Data Head".
    pub preview_rows: usize,
    pub histogram_bins: usize,
    /// Words drawn in the word cloud.
    pub word_cloud_words: usize,
    /// Numeric columns drawn in the scatter matrix.
    pub scatter_matrix_max_columns: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_header_row: 100,
            preview_rows: 5,
            histogram_bins: 20,
            word_cloud_words: 60,
            scatter_matrix_max_columns: 5,
        }
    }
}

impl Settings {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_json::from_str(&text).context("parsing settings JSON")
    }

    /// Settings from the file named by [`CONFIG_ENV`], or defaults when the
    /// variable is unset or the file is unusable.
    pub fn load() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV) else {
            return Self::default();
        };
        match Self::from_json_file(Path::new(&path)) {
            Ok(settings) => {
                log::info!("Using settings from {}", Path::new(&path).display());
                settings
            }
            Err(e) => {
                log::error!("Ignoring settings: {e:#}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s: Settings = serde_json::from_str(r#"{ "histogram_bins": 8 }"#).unwrap();
        assert_eq!(s.histogram_bins, 8);
        assert_eq!(s.max_header_row, 100);
        assert_eq!(s.preview_rows, 5);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Settings::from_json_file(Path::new("/definitely/not/here.json")).is_err());
    }
}
