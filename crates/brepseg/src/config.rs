//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! palette = [[255, 0, 0], [0, 0, 255]]
//!
//! [display.dimmed]
//! color = [255, 255, 255]
//! transparency = 0.7
//!
//! [batch]
//! extensions = ["step", "stp"]
//! work_dir = "/tmp/brepseg"
//! ```
//!
//! Every table and key is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actor::{DisplayStyle, Paint};
use crate::catalog::{Rgb, DEFAULT_PALETTE};
use crate::error::{EngineError, EngineResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Dimmed paints.
    pub display: DisplayStyle,
    /// Batch discovery and working directory.
    pub batch: BatchConfig,
    /// Category colors; [`DEFAULT_PALETTE`] when absent.
    pub palette: Option<Vec<Rgb>>,
}

/// Batch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// File extensions treated as CAD input, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Scratch directory for inference collaborators. A fresh temporary
    /// directory is used when unset.
    pub work_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["step".into(), "stp".into()],
            work_dir: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        let config = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// The palette to color categories with.
    pub fn palette(&self) -> &[Rgb] {
        match &self.palette {
            Some(p) if !p.is_empty() => p.as_slice(),
            _ => &DEFAULT_PALETTE[..],
        }
    }

    fn validate(&self) -> EngineResult<()> {
        check_paint("display.dimmed", &self.display.dimmed)?;
        check_paint("display.selection_dimmed", &self.display.selection_dimmed)?;
        if self.batch.extensions.is_empty() {
            return Err(EngineError::Config("batch.extensions must not be empty".into()));
        }
        Ok(())
    }
}

fn check_paint(key: &str, paint: &Paint) -> EngineResult<()> {
    if (0.0..=1.0).contains(&paint.transparency) {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{key}.transparency must be within 0..=1, got {}",
            paint.transparency
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.palette(), &DEFAULT_PALETTE[..]);
        assert_eq!(config.batch.extensions, vec!["step", "stp"]);
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_toml_str(
            r#"
            palette = [[1, 2, 3]]

            [display.selection_dimmed]
            color = [10, 10, 10]
            transparency = 0.5

            [batch]
            work_dir = "/tmp/seg"
            "#,
        )
        .unwrap();
        assert_eq!(config.palette(), &[Rgb::new(1, 2, 3)]);
        assert_eq!(config.display.selection_dimmed.transparency, 0.5);
        assert_eq!(config.display.dimmed, DisplayStyle::default().dimmed);
        assert_eq!(config.batch.work_dir, Some(PathBuf::from("/tmp/seg")));
        assert_eq!(config.batch.extensions.len(), 2);
    }

    #[test]
    fn test_rejects_bad_transparency() {
        let err = EngineConfig::from_toml_str(
            "[display.dimmed]\ncolor = [0, 0, 0]\ntransparency = 1.5\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_extensions() {
        assert!(EngineConfig::from_toml_str("[batch]\nextensions = []\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brepseg.toml");
        std::fs::write(&path, "[batch]\nextensions = [\"STEP\"]\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.batch.extensions, vec!["STEP"]);
    }
}
