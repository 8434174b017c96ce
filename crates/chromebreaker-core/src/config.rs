//! Export option record
//!
//! Options are stored as a small JSON document next to the tool or at a
//! path given on the command line.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ResultExt};

/// Options consumed by the resource writers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Attempt image-format fixup on texture output
    pub png_fixup: bool,
    /// Always dump raw parts, even for types with a dedicated writer
    pub dump_raw: bool,
    /// Write `manifest.json` into the output root
    pub write_manifest: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            png_fixup: true,
            dump_raw: false,
            write_manifest: true,
        }
    }
}

impl ExportOptions {
    /// Parse options from JSON text; missing keys take their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Load options from `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let defaults = Self::default();
            defaults
                .save(path)
                .with_context(|| format!("writing default options to {}", path.display()))?;
            return Ok(defaults);
        }

        let text = fs::read_to_string(path).map_err(Error::from);
        text.and_then(|text| Self::from_json(&text))
            .with_context(|| format!("loading options from {}", path.display()))
    }

    /// Write options as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ExportOptions::default();
        assert!(opts.png_fixup);
        assert!(!opts.dump_raw);
        assert!(opts.write_manifest);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let opts = ExportOptions::from_json(r#"{ "dump_raw": true }"#).unwrap();
        assert!(opts.dump_raw);
        assert!(opts.png_fixup);
    }

    #[test]
    fn test_empty_text_is_default() {
        assert_eq!(ExportOptions::from_json("  \n").unwrap(), ExportOptions::default());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = ExportOptions::from_json("{ dump_raw: yes").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("options.json");

        let opts = ExportOptions::load_or_create(&path).unwrap();
        assert_eq!(opts, ExportOptions::default());
        assert!(path.exists());

        fs::write(&path, r#"{ "png_fixup": false }"#).unwrap();
        let reloaded = ExportOptions::load_or_create(&path).unwrap();
        assert!(!reloaded.png_fixup);
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, "[1, 2").unwrap();

        let err = ExportOptions::load_or_create(&path).unwrap_err();
        assert!(err.to_string().contains("options.json"));
        let Error::WithContext { source, .. } = err else {
            panic!("expected context wrapper");
        };
        assert!(matches!(*source, Error::InvalidConfig { .. }));
    }
}
