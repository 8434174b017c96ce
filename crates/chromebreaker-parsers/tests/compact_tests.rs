//! Integration tests for compact mesh assembly
//!
//! A synthetic five-part mesh resource is built here the way the engine
//! lays it out: 1-based pointers in the image, a fixup table listing them,
//! packed vertices and 16-bit indices in their own parts.

use std::io::Cursor;

use bytes::Bytes;
use chromebreaker_parsers::binary::Record;
use chromebreaker_parsers::compact::{
    resolve_pointer, CompactMeshAssembler, DlVertex32, MaterialDatabase, MaterialSlot, MeshEntity, MeshFileHeader,
    MeshFixups, NodeFormat, Pointer, ResolvedImage, NULL_OFFSET,
};
use chromebreaker_parsers::msh::{Matrix3x4, MshParser, MshWriter, NodeKind, NO_PARENT};
use chromebreaker_parsers::traits::{ErrorKind, ParseError, Parser};
use half::f16;
use proptest::prelude::*;

/// Flattened image under construction, with its pointer slots
#[derive(Default)]
struct ImageBuilder {
    bytes: Vec<u8>,
    slots: Vec<u32>,
}

impl ImageBuilder {
    /// Append a record and return its offset
    fn push<T: Record>(&mut self, record: &T) -> usize {
        let at = self.bytes.len();
        record.encode(&mut self.bytes).unwrap();
        at
    }

    fn push_str(&mut self, s: &str) -> usize {
        let at = self.bytes.len();
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        at
    }

    fn align(&mut self) {
        let len = self.bytes.len().div_ceil(8) * 8;
        self.bytes.resize(len, 0);
    }

    /// Store a 1-based pointer to `target` (0 for null) at `slot`
    fn link(&mut self, slot: usize, target: Option<usize>) {
        let raw = target.map_or(0u64, |t| t as u64 + 1);
        self.bytes[slot..slot + 8].copy_from_slice(&raw.to_le_bytes());
        self.slots.push(slot as u32);
    }
}

/// Field offsets of pointer members inside their records
const HEADER_NODES: usize = 8;
const HEADER_SURFACES: usize = 16;
const HEADER_MATERIALS: usize = 24;
const DB_SLOTS: usize = 0;
const SLOT_NAME: usize = 8;
const ENTITY_NAME: usize = 120;
const ENTITY_FORMAT: usize = 136;
const FORMAT_INDEX_COUNTS: usize = 24;

fn vertex(position: [f32; 3], rotation: [i16; 4], uv: [f32; 2]) -> DlVertex32 {
    DlVertex32 {
        position,
        rotation,
        uv0: uv.map(f16::from_f32),
        uv1: [f16::from_f32(0.0); 2],
        weights: [0; 4],
    }
}

/// Two nodes: an empty root and a child with one LOD of three vertices
/// split into two surfaces (3 and 3 indices).
fn build_mesh_resource(layout_id: u16) -> Vec<Bytes> {
    let mut image = ImageBuilder::default();

    let header_at = image.push(&MeshFileHeader { nodes_count: 2, surfaces_count: 3, ..MeshFileHeader::default() });
    image.align();

    let surfaces_at = image.bytes.len();
    for id in [17u32, 7, 99] {
        image.bytes.extend_from_slice(&id.to_le_bytes());
    }
    image.align();

    let db_at = image.push(&MaterialDatabase { surface_count: 3, material_count: 2, ..MaterialDatabase::default() });
    let slots_at = image.push(&MaterialSlot { vertex_layout: 3, ..MaterialSlot::default() });
    image.push(&MaterialSlot::default());

    let mat_a = image.push_str("hull_paint");
    let mat_b = image.push_str("window");
    let root_name = image.push_str("root");
    let body_name = image.push_str("body");
    image.align();

    let root_at = image.push(&MeshEntity { parent: NO_PARENT, kind: 0, ..MeshEntity::default() });
    let body_at = image.push(&MeshEntity {
        parent: 0,
        kind: 1,
        lod_count: 1,
        node_index: 1,
        local: Matrix3x4([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 2.0, 0.0]),
        ..MeshEntity::default()
    });

    let format_at = image.push(&NodeFormat {
        object_count_a: 2,
        object_count_b: 2,
        vertex_layout_id: layout_id,
        vertex_count: 3,
        ..NodeFormat::default()
    });
    let counts_at = image.bytes.len();
    for count in [3u32, 3] {
        image.bytes.extend_from_slice(&count.to_le_bytes());
    }

    image.link(header_at + HEADER_NODES, Some(root_at));
    image.link(header_at + HEADER_SURFACES, Some(surfaces_at));
    image.link(header_at + HEADER_MATERIALS, Some(db_at));
    image.link(db_at + DB_SLOTS, Some(slots_at));
    image.link(slots_at + SLOT_NAME, Some(mat_a));
    image.link(slots_at + MaterialSlot::SIZE + SLOT_NAME, Some(mat_b));
    image.link(root_at + ENTITY_NAME, Some(root_name));
    image.link(root_at + ENTITY_FORMAT, None);
    image.link(body_at + ENTITY_NAME, Some(body_name));
    image.link(body_at + ENTITY_FORMAT, Some(format_at));
    image.link(format_at + FORMAT_INDEX_COUNTS, Some(counts_at));

    let fixups = MeshFixups {
        memory_size: image.bytes.len() as u32,
        pointer_slots: image.slots.clone(),
        ..MeshFixups::default()
    };

    let mut vertices = Vec::new();
    for v in [
        vertex([0.0, 0.0, 0.0], [0, 0, 0, 32767], [0.0, 0.0]),
        vertex([1.0, 0.0, 0.0], [0, 0, 0, 32767], [1.0, 0.0]),
        vertex([0.0, 1.0, 0.0], [0, 0, 0, 0], [0.0, 1.0]),
    ] {
        v.encode(&mut vertices).unwrap();
    }

    let indices: Vec<u8> = [0u16, 1, 2, 2, 1, 0].iter().flat_map(|i| i.to_le_bytes()).collect();

    vec![
        Bytes::from(image.bytes),
        Bytes::new(),
        Bytes::from(fixups.to_bytes().unwrap()),
        Bytes::from(vertices),
        Bytes::from(indices),
    ]
}

fn floats(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

mod assembly_tests {
    use super::*;

    #[test]
    fn test_tables_and_names() {
        let file = CompactMeshAssembler::new().assemble(&build_mesh_resource(3)).unwrap();

        assert_eq!(file.materials, ["hull_paint", "window"]);
        assert_eq!(file.surface_types, ["Metal", "Grass", "99"]);
        let header = file.header().unwrap();
        assert_eq!((header.node_count, header.material_count, header.surface_type_count), (2, 2, 3));
    }

    #[test]
    fn test_node_hierarchy() {
        let file = CompactMeshAssembler::new().assemble(&build_mesh_resource(3)).unwrap();

        let root = &file.nodes[0];
        assert_eq!(root.name, "root");
        assert_eq!(root.parent, None);
        assert_eq!(root.kind, NodeKind::Empty);
        assert_eq!(root.descendant_count, 1);
        assert!(root.meshes.is_empty());

        let body = &file.nodes[1];
        assert_eq!(body.name, "body");
        assert_eq!(body.parent, Some(0));
        assert_eq!(body.kind, NodeKind::Mesh);
        assert_eq!(body.descendant_count, 0);
        assert_eq!(body.local.translation(), [0.0, 2.0, 0.0]);
        assert_eq!(body.meshes.len(), 1);
    }

    #[test]
    fn test_lod_streams_and_surfaces() {
        let file = CompactMeshAssembler::new().assemble(&build_mesh_resource(3)).unwrap();
        let mesh = &file.nodes[1].meshes[0];

        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.indices, [0, 1, 2, 2, 1, 0]);

        assert_eq!(mesh.surfaces.len(), 2);
        assert_eq!((mesh.surfaces[0].offset, mesh.surfaces[0].count), (0, 3));
        assert_eq!((mesh.surfaces[1].offset, mesh.surfaces[1].count), (3, 3));
        assert!(mesh.surfaces.iter().all(|s| s.material_id == 0 && s.bones.is_empty()));

        assert_eq!(floats(&mesh.positions[0]), [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(floats(&mesh.uvs[0]), [0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(mesh.uvs[1].len(), 3 * 2 * 4);
        assert!(mesh.positions[1].is_empty());
        assert!(mesh.uvs[2].is_empty());

        // Identity and degenerate quaternions both give the canonical frame
        let normals = floats(&mesh.normals[0]);
        for v in 0..3 {
            let n = &normals[v * 3..v * 3 + 3];
            assert!((n[2] - 1.0).abs() < 1e-4 && n[0].abs() < 1e-4 && n[1].abs() < 1e-4);
        }
    }

    #[test]
    fn test_assembled_mesh_writes_and_reads_back() {
        let file = CompactMeshAssembler::new().assemble(&build_mesh_resource(3)).unwrap();
        let bytes = MshWriter::new().to_bytes(&file).unwrap();
        let parsed = MshParser::new().parse(Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn test_unknown_layout_is_unsupported() {
        let err = CompactMeshAssembler::new().assemble(&build_mesh_resource(8)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(err.to_string().contains("body"));
    }

    #[test]
    fn test_short_index_part_is_out_of_bounds() {
        let mut parts = build_mesh_resource(3);
        parts[4] = parts[4].slice(..4);
        let err = CompactMeshAssembler::new().assemble(&parts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_pointer_slot_past_image_is_out_of_bounds() {
        let mut parts = build_mesh_resource(3);
        let mut fixups = MeshFixups::from_bytes(&parts[2]).unwrap();
        fixups.pointer_slots.push(parts[0].len() as u32 - 2);
        parts[2] = Bytes::from(fixups.to_bytes().unwrap());

        let err = CompactMeshAssembler::new().assemble(&parts).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
        assert!(err.to_string().contains("mesh image"));
    }

    #[test]
    fn test_four_parts_is_unsupported() {
        let mut parts = build_mesh_resource(3);
        parts.pop();
        let err = CompactMeshAssembler::new().assemble(&parts).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }
}

mod fixup_tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_listed_slots_resolve(values in proptest::collection::vec(any::<u64>(), 1..32)) {
            let mut image = Vec::new();
            for v in &values {
                image.extend_from_slice(&v.to_le_bytes());
            }
            let fixups = MeshFixups {
                pointer_slots: (0..values.len() as u32).map(|i| i * 8).collect(),
                ..MeshFixups::default()
            };

            let resolved = ResolvedImage::resolve(image, &fixups).unwrap();
            for (i, &raw) in values.iter().enumerate() {
                let stored = resolved.pointer_at(i * 8).unwrap().0;
                if raw == 0 || raw == 0xFFFF {
                    prop_assert_eq!(stored, NULL_OFFSET);
                } else {
                    prop_assert_eq!(stored, raw - 1);
                }
            }
        }

        #[test]
        fn prop_unlisted_slots_untouched(values in proptest::collection::vec(any::<u64>(), 2..16)) {
            let mut image = Vec::new();
            for v in &values {
                image.extend_from_slice(&v.to_le_bytes());
            }
            // Only even slots are listed
            let fixups = MeshFixups {
                pointer_slots: (0..values.len() as u32).step_by(2).map(|i| i * 8).collect(),
                ..MeshFixups::default()
            };

            let resolved = ResolvedImage::resolve(image, &fixups).unwrap();
            for (i, &raw) in values.iter().enumerate() {
                let stored = resolved.pointer_at(i * 8).unwrap().0;
                let expected = if i % 2 == 0 { resolve_pointer(raw) } else { raw };
                prop_assert_eq!(stored, expected);
            }
        }

        #[test]
        fn prop_pointer_target_uses_low_word(offset in 0u32..u32::MAX, high in any::<u32>()) {
            let pointer = Pointer((u64::from(high) << 32) | u64::from(offset));
            prop_assert_eq!(pointer.target(), Some(offset as usize));
        }
    }
}
