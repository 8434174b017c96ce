//! Export manifest
//!
//! One JSON document per unpacked archive listing every resource that
//! reached the writer and every resource that was dropped before it.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chromebreaker_core::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Files written for one logical resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub index: usize,
    pub name: String,
    /// Engine type name, e.g. `EResType::Mesh`
    pub resource_type: String,
    /// Paths relative to the output root, `/`-separated
    pub files: Vec<String>,
    pub raw_fallback: bool,
}

/// A resource that produced no files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Source archive, as given on the command line
    pub archive: Option<String>,
    pub png_fixup: bool,
    pub resources: Vec<ManifestEntry>,
    pub skipped: Vec<SkippedEntry>,
}

impl Manifest {
    pub fn new(archive: Option<&Path>, png_fixup: bool) -> Self {
        Self {
            archive: archive.map(|p| p.display().to_string()),
            png_fixup,
            ..Self::default()
        }
    }

    /// Number of resources written as raw parts although a typed writer exists
    pub fn raw_fallback_count(&self) -> usize {
        self.resources.iter().filter(|r| r.raw_fallback).count()
    }

    pub fn file_count(&self) -> usize {
        self.resources.iter().map(|r| r.files.len()).sum()
    }

    /// Write as pretty JSON to `<out_root>/manifest.json`
    pub fn save(&self, out_root: &Path) -> Result<PathBuf> {
        let path = out_root.join(MANIFEST_FILE_NAME);
        self.write_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(Error::from);
        text.and_then(|text| serde_json::from_str(&text).map_err(|e| Error::export(format!("manifest: {e}"))))
            .with_context(|| format!("reading {}", path.display()))
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self).map_err(|e| Error::export(format!("manifest: {e}")))
    }
}
