//! Integration tests for the resource writers
//!
//! Every test writes into its own temporary directory and checks the
//! files that land there plus the manifest entries that describe them.

use std::fs;

use bytes::Bytes;
use chromebreaker_core::{ExportOptions, ResourceType};
use chromebreaker_export::{Manifest, ResourceWriter, MANIFEST_FILE_NAME};
use chromebreaker_parsers::binary::Record;
use chromebreaker_parsers::compact::{MeshFileHeader, MeshFixups};
use chromebreaker_parsers::msh::MshParser;
use chromebreaker_parsers::traits::Parser;
use chromebreaker_parsers::{Extraction, Outcome, ResourceInfo};
use tempfile::TempDir;

fn resource(index: usize, name: &str, kind: ResourceType, parts: Vec<Vec<u8>>) -> ResourceInfo {
    ResourceInfo {
        logical_index: index,
        name: name.into(),
        file_type: kind.code(),
        parts: parts.into_iter().map(Bytes::from).collect(),
    }
}

/// Smallest valid compact mesh: a header whose table pointers are all null
fn empty_mesh_parts() -> Vec<Vec<u8>> {
    let mut image = Vec::new();
    MeshFileHeader::default().encode(&mut image).unwrap();
    let fixups = MeshFixups {
        memory_size: image.len() as u32,
        pointer_slots: vec![0, 8, 16, 24],
        ..MeshFixups::default()
    };
    vec![image, Vec::new(), fixups.to_bytes().unwrap(), Vec::new(), Vec::new()]
}

fn write_one(options: ExportOptions, resource: &ResourceInfo) -> (TempDir, chromebreaker_export::ManifestEntry) {
    let dir = tempfile::tempdir().unwrap();
    let writer = ResourceWriter::new(dir.path(), options);
    match writer.write(resource) {
        Outcome::Ok(entry) => (dir, entry),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

mod dispatch_tests {
    use super::*;

    #[test]
    fn test_mesh_written_as_msh() {
        let res = resource(2, "crate", ResourceType::Mesh, empty_mesh_parts());
        let (dir, entry) = write_one(ExportOptions::default(), &res);

        assert_eq!(entry.files, ["Mesh/crate.msh"]);
        assert!(!entry.raw_fallback);
        assert_eq!(entry.resource_type, "EResType::Mesh");

        let parsed = MshParser::new().parse_file(&dir.path().join("Mesh").join("crate.msh")).unwrap();
        assert!(parsed.nodes.is_empty());
    }

    #[test]
    fn test_animation_writes_first_part() {
        let res = resource(0, "walk", ResourceType::Animation, vec![vec![1, 2, 3], vec![9; 8]]);
        let (dir, entry) = write_one(ExportOptions::default(), &res);

        assert_eq!(entry.files, ["Animation/walk.anm2"]);
        assert_eq!(fs::read(dir.path().join("Animation/walk.anm2")).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_other_types_dump_raw() {
        let res = resource(7, "diffuse", ResourceType::Texture, vec![vec![0xAA; 4], vec![0xBB; 2]]);
        let (dir, entry) = write_one(ExportOptions::default(), &res);

        assert_eq!(
            entry.files,
            ["Texture/0007_diffuse_part00.bin", "Texture/0007_diffuse_part01.bin"]
        );
        assert!(!entry.raw_fallback);
        assert_eq!(fs::read(dir.path().join("Texture/0007_diffuse_part01.bin")).unwrap(), [0xBB; 2]);
    }

    #[test]
    fn test_dump_raw_bypasses_mesh_writer() {
        let options = ExportOptions { dump_raw: true, ..ExportOptions::default() };
        let res = resource(1, "crate", ResourceType::Mesh, empty_mesh_parts());
        let (_dir, entry) = write_one(options, &res);

        assert_eq!(entry.files.len(), 5);
        assert!(entry.files.iter().all(|f| f.starts_with("Mesh/0001_crate_part")));
        assert!(!entry.raw_fallback);
    }

    #[test]
    fn test_unsupported_mesh_falls_back_to_raw() {
        let res = resource(3, "broken", ResourceType::Mesh, vec![vec![0; 8]; 3]);
        let (dir, entry) = write_one(ExportOptions::default(), &res);

        assert!(entry.raw_fallback);
        assert_eq!(entry.files.len(), 3);
        assert!(!dir.path().join("Mesh/broken.msh").exists());
        assert!(dir.path().join("Mesh/0003_broken_part02.bin").exists());
    }

    #[test]
    fn test_unresolvable_pointer_slot_falls_back_to_raw() {
        let mut parts = empty_mesh_parts();
        let mut fixups = MeshFixups::from_bytes(&parts[2]).unwrap();
        fixups.pointer_slots.push(parts[0].len() as u32);
        parts[2] = fixups.to_bytes().unwrap();

        let res = resource(5, "dangling", ResourceType::Mesh, parts);
        let (dir, entry) = write_one(ExportOptions::default(), &res);

        assert!(entry.raw_fallback);
        assert_eq!(entry.files.len(), 5);
        assert!(!dir.path().join("Mesh/dangling.msh").exists());
    }

    #[test]
    fn test_unsafe_name_is_sanitized() {
        let res = resource(4, "props/box:a", ResourceType::Shader, vec![vec![1]]);
        let (_dir, entry) = write_one(ExportOptions::default(), &res);
        assert_eq!(entry.files, ["Shader/0004_props_box_a_part00.bin"]);
        assert_eq!(entry.name, "props/box:a");
    }

    #[test]
    fn test_no_parts_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResourceWriter::new(dir.path(), ExportOptions::default());
        let res = resource(0, "empty", ResourceType::Sound, Vec::new());
        assert!(matches!(writer.write(&res), Outcome::Skip(_)));
    }
}

mod manifest_tests {
    use super::*;

    fn extraction() -> Extraction {
        Extraction {
            resources: vec![
                resource(0, "crate", ResourceType::Mesh, empty_mesh_parts()),
                resource(1, "broken", ResourceType::Mesh, vec![vec![0; 4]]),
                resource(2, "snd", ResourceType::Sound, vec![vec![5; 5]]),
            ],
            skipped: vec![(3, "section 1 unavailable".into())],
            ..Extraction::default()
        }
    }

    #[test]
    fn test_manifest_lists_everything() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ResourceWriter::new(dir.path(), ExportOptions::default());
        let manifest = writer.write_extraction(&extraction(), None).unwrap();

        assert_eq!(manifest.resources.len(), 3);
        assert_eq!(manifest.raw_fallback_count(), 1);
        assert_eq!(manifest.file_count(), 3);
        assert_eq!(manifest.skipped.len(), 1);
        assert_eq!(manifest.skipped[0].index, 3);
        assert!(manifest.png_fixup);

        let saved = Manifest::load(&dir.path().join(MANIFEST_FILE_NAME)).unwrap();
        assert_eq!(saved, manifest);
    }

    #[test]
    fn test_manifest_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions { write_manifest: false, ..ExportOptions::default() };
        let writer = ResourceWriter::new(dir.path(), options);
        writer.write_extraction(&extraction(), None).unwrap();

        assert!(!dir.path().join(MANIFEST_FILE_NAME).exists());
        assert!(dir.path().join("Sound/0002_snd_part00.bin").exists());
    }
}
