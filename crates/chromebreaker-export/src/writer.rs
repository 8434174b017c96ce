//! Resource writer dispatch
//!
//! Each extracted resource goes to `<out_root>/<type display name>/`.
//! Meshes and animations have dedicated writers; every other type, and any
//! resource whose dedicated writer fails, is dumped part by part.

use std::fs;
use std::path::{Path, PathBuf};

use chromebreaker_core::{Error, ExportOptions, ResourceType, Result};
use chromebreaker_parsers::logging::resource_span;
use chromebreaker_parsers::{
    CompactMeshAssembler, Extraction, MshWriter, Outcome, ParseResult, ResourceInfo,
};
use tracing::{debug, error, info, warn};

use crate::manifest::{Manifest, ManifestEntry, SkippedEntry};

const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make an archive name usable as a single path component.
///
/// Reserved and control characters become `_`; leading and trailing dots
/// and spaces are dropped. An empty result becomes `unnamed`.
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c.is_control() || RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{index:04}_{name}_part{part:02}.bin`
pub fn raw_part_name(index: usize, name: &str, part: usize) -> String {
    format!("{index:04}_{name}_part{part:02}.bin")
}

/// Writes resources below one output root
#[derive(Debug, Clone)]
pub struct ResourceWriter {
    out_root: PathBuf,
    options: ExportOptions,
    assembler: CompactMeshAssembler,
    msh: MshWriter,
}

impl ResourceWriter {
    pub fn new(out_root: impl Into<PathBuf>, options: ExportOptions) -> Self {
        Self {
            out_root: out_root.into(),
            options,
            assembler: CompactMeshAssembler::new(),
            msh: MshWriter::new(),
        }
    }

    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Directory that receives resources of `kind`
    pub fn type_dir(&self, kind: ResourceType) -> PathBuf {
        self.out_root.join(kind.pretty_name())
    }

    /// Write one resource.
    ///
    /// A failing mesh or animation writer falls back to a raw dump unless
    /// the failure is an I/O or invariant error, which is fatal.
    pub fn write(&self, resource: &ResourceInfo) -> Outcome<ManifestEntry> {
        if resource.parts.is_empty() {
            return Outcome::Skip("resource has no parts".into());
        }

        let _span = resource_span(resource.logical_index, &resource.name).entered();
        let kind = resource.resource_type();
        let name = sanitize_name(&resource.name);
        let dir = self.type_dir(kind);
        if let Err(e) = fs::create_dir_all(&dir) {
            return Outcome::Fatal(e.into());
        }

        let mut raw_fallback = false;
        if !self.options.dump_raw {
            let typed = match kind {
                ResourceType::Mesh => Some(self.write_mesh(resource, &dir, &name)),
                ResourceType::Animation => Some(self.write_animation(resource, &dir, &name)),
                _ => None,
            };

            match typed {
                Some(Ok(files)) => return Outcome::Ok(self.entry(resource, kind, files, false)),
                Some(Err(e)) if !e.kind().allows_raw_fallback() => return Outcome::Fatal(e),
                Some(Err(e)) => {
                    error!(
                        index = resource.logical_index,
                        name = %resource.name,
                        kind = %kind,
                        error = %e,
                        "Conversion failed, dumping raw parts"
                    );
                    raw_fallback = true;
                }
                None => {}
            }
        }

        match self.write_raw(resource, &dir, &name) {
            Ok(files) => Outcome::Ok(self.entry(resource, kind, files, raw_fallback)),
            Err(e) => Outcome::Fatal(e),
        }
    }

    /// Write every extracted resource, then the manifest if enabled
    pub fn write_extraction(&self, extraction: &Extraction, archive: Option<&Path>) -> Result<Manifest> {
        let mut manifest = Manifest::new(archive, self.options.png_fixup);

        for &(index, ref reason) in &extraction.skipped {
            manifest.skipped.push(SkippedEntry {
                index,
                name: extraction.archive.name_of(index),
                reason: reason.clone(),
            });
        }

        for resource in &extraction.resources {
            match self.write(resource) {
                Outcome::Ok(entry) => manifest.resources.push(entry),
                Outcome::Skip(reason) => {
                    warn!(index = resource.logical_index, name = %resource.name, %reason, "Resource skipped");
                    manifest.skipped.push(SkippedEntry {
                        index: resource.logical_index,
                        name: resource.name.clone(),
                        reason,
                    });
                }
                Outcome::Fatal(e) => {
                    return Err(Error::from(e)
                        .with_context(format!("resource {} ({})", resource.logical_index, resource.name)));
                }
            }
        }

        if self.options.write_manifest {
            let path = manifest.save(&self.out_root)?;
            debug!(path = %path.display(), "Wrote manifest");
        }

        info!(
            resources = manifest.resources.len(),
            files = manifest.file_count(),
            raw_fallbacks = manifest.raw_fallback_count(),
            skipped = manifest.skipped.len(),
            "Export complete"
        );

        Ok(manifest)
    }

    fn write_mesh(&self, resource: &ResourceInfo, dir: &Path, name: &str) -> ParseResult<Vec<PathBuf>> {
        let mesh = self.assembler.assemble(&resource.parts)?;
        let bytes = self.msh.to_bytes(&mesh)?;

        let path = dir.join(format!("{name}.msh"));
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), nodes = mesh.nodes.len(), meshes = mesh.mesh_count(), "Wrote mesh");
        Ok(vec![path])
    }

    fn write_animation(&self, resource: &ResourceInfo, dir: &Path, name: &str) -> ParseResult<Vec<PathBuf>> {
        if resource.parts.len() > 1 {
            warn!(
                index = resource.logical_index,
                name = %resource.name,
                parts = resource.parts.len(),
                "Animation has extra parts; writing part 0 only"
            );
        }

        let path = dir.join(format!("{name}.anm2"));
        fs::write(&path, &resource.parts[0])?;
        Ok(vec![path])
    }

    fn write_raw(&self, resource: &ResourceInfo, dir: &Path, name: &str) -> ParseResult<Vec<PathBuf>> {
        let mut files = Vec::with_capacity(resource.parts.len());
        for (part, data) in resource.parts.iter().enumerate() {
            let path = dir.join(raw_part_name(resource.logical_index, name, part));
            fs::write(&path, data)?;
            files.push(path);
        }
        debug!(index = resource.logical_index, parts = files.len(), "Dumped raw parts");
        Ok(files)
    }

    fn entry(&self, resource: &ResourceInfo, kind: ResourceType, files: Vec<PathBuf>, raw_fallback: bool) -> ManifestEntry {
        ManifestEntry {
            index: resource.logical_index,
            name: resource.name.clone(),
            resource_type: kind.to_string(),
            files: files.iter().map(|path| self.relative(path)).collect(),
            raw_fallback,
        }
    }

    fn relative(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.out_root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_reserved() {
        assert_eq!(sanitize_name("meshes/crate:01"), "meshes_crate_01");
        assert_eq!(sanitize_name("a\tb"), "a_b");
        assert_eq!(sanitize_name("plain_name"), "plain_name");
    }

    #[test]
    fn test_sanitize_empty_and_dots() {
        assert_eq!(sanitize_name(""), "unnamed");
        assert_eq!(sanitize_name(".."), "unnamed");
        assert_eq!(sanitize_name(" .hidden. "), "hidden");
    }

    #[test]
    fn test_raw_part_name() {
        assert_eq!(raw_part_name(7, "crate", 0), "0007_crate_part00.bin");
        assert_eq!(raw_part_name(12345, "x", 12), "12345_x_part12.bin");
    }

    #[test]
    fn test_type_dir_uses_display_name() {
        let writer = ResourceWriter::new("/out", ExportOptions::default());
        assert_eq!(writer.type_dir(ResourceType::SfxStream), Path::new("/out").join("SFX_stream"));
    }
}
