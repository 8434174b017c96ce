// chromebreaker-parsers/src/compact/mod.rs
//! Compact mesh assembly
//!
//! A mesh resource in an RP6 pack has five parts:
//!
//! | Part | Content                                   |
//! |------|-------------------------------------------|
//! | 0    | Flattened mesh image (records + strings)  |
//! | 1    | Unused here                               |
//! | 2    | Pointer fixup table for part 0            |
//! | 3    | Packed vertex data, consumed in LOD order |
//! | 4    | 16-bit index data, consumed in LOD order  |
//!
//! All offsets inside the image are relative to the image itself.

mod fixups;
mod records;
mod vertex;

pub use fixups::{resolve_pointer, MeshFixups, ObjectResolve, Pointer, ResolvedImage, NULL_OFFSET};
pub use records::{MaterialDatabase, MaterialSlot, MeshEntity, MeshFileHeader, NodeFormat, SurfaceId};
pub use vertex::{DecodedVertices, DlVertex32, VertexLayout};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::binary::{cstring_at, pack_f32, record_at, records_at, slice_at};
use crate::msh::{MeshBlock, MshFile, MshNode, NodeKind, Surface, NO_PARENT};
use crate::traits::{ParseError, ParseResult};
use fixups::U32Le;

/// Number of parts a mesh resource must have
pub const MESH_PART_COUNT: usize = 5;

const PART_IMAGE: usize = 0;
const PART_FIXUPS: usize = 2;
const PART_VERTICES: usize = 3;
const PART_INDICES: usize = 4;

/// Sequential reader over one data part
struct PartCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PartCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn take(&mut self, len: usize) -> ParseResult<&'a [u8]> {
        let bytes = slice_at(self.data, self.position, len)?;
        self.position += len;
        Ok(bytes)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

/// Builds the shared mesh model from a compact mesh resource
#[derive(Debug, Default, Clone, Copy)]
pub struct CompactMeshAssembler;

impl CompactMeshAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the image and assemble every node, material and LOD
    pub fn assemble(&self, parts: &[Bytes]) -> ParseResult<MshFile> {
        if parts.len() != MESH_PART_COUNT {
            return Err(ParseError::UnsupportedFormat(format!(
                "mesh resource has {} parts, expected {MESH_PART_COUNT}",
                parts.len()
            )));
        }

        let fixups = MeshFixups::from_bytes(&parts[PART_FIXUPS])
            .map_err(|e| e.with_context("mesh fixups"))?;
        let image = ResolvedImage::resolve(parts[PART_IMAGE].to_vec(), &fixups)
            .map_err(|e| e.with_context("mesh image"))?;

        let mut vertices = PartCursor::new(&parts[PART_VERTICES]);
        let mut indices = PartCursor::new(&parts[PART_INDICES]);

        let file = self.assemble_image(&image, &mut vertices, &mut indices)?;

        if vertices.remaining() > 0 || indices.remaining() > 0 {
            debug!(
                vertex_bytes = vertices.remaining(),
                index_bytes = indices.remaining(),
                "Unconsumed mesh data"
            );
        }
        Ok(file)
    }

    fn assemble_image(
        &self,
        image: &ResolvedImage,
        vertices: &mut PartCursor<'_>,
        indices: &mut PartCursor<'_>,
    ) -> ParseResult<MshFile> {
        let bytes = image.as_bytes();
        let header: MeshFileHeader = record_at(bytes, 0)?;

        let surface_types = match header.surface_params.target() {
            Some(offset) => records_at::<SurfaceId>(bytes, offset, header.surfaces_count as usize)?
                .into_iter()
                .map(|id| id.to_string())
                .collect(),
            None => {
                if header.surfaces_count > 0 {
                    warn!(count = header.surfaces_count, "Surface table pointer is null");
                }
                Vec::new()
            }
        };

        let materials = self.read_materials(bytes, &header)?;

        let entities = match header.nodes.target() {
            Some(offset) => records_at::<MeshEntity>(bytes, offset, header.nodes_count as usize)?,
            None => Vec::new(),
        };
        let parents: Vec<u16> = entities.iter().map(|e| e.parent).collect();
        let descendants = count_descendants(&parents);

        let mut nodes = Vec::with_capacity(entities.len());
        for (index, entity) in entities.iter().enumerate() {
            let name = entity.name.target().map(|o| cstring_at(bytes, o)).unwrap_or_default();
            let meshes = self
                .read_lods(bytes, entity, vertices, indices)
                .map_err(|e| e.with_context(format!("node {index} ({name})")))?;

            nodes.push(MshNode {
                name,
                parent: (entity.parent != NO_PARENT).then_some(entity.parent),
                kind: NodeKind::from_u8(entity.kind),
                local: entity.local,
                bind: entity.bind,
                bounds: entity.bounds,
                lod_count: entity.lod_count,
                descendant_count: descendants[index],
                meshes,
            });
        }

        debug!(
            nodes = nodes.len(),
            materials = materials.len(),
            surface_types = surface_types.len(),
            "Assembled compact mesh"
        );

        Ok(MshFile {
            nodes,
            materials,
            surface_types,
        })
    }

    fn read_materials(&self, bytes: &[u8], header: &MeshFileHeader) -> ParseResult<Vec<String>> {
        let Some(db_offset) = header.materials_db.target() else {
            return Ok(Vec::new());
        };
        let database: MaterialDatabase = record_at(bytes, db_offset)?;
        let Some(slots_offset) = database.slots.target() else {
            return Ok(Vec::new());
        };

        let slots = records_at::<MaterialSlot>(bytes, slots_offset, usize::from(database.material_count))?;
        Ok(slots
            .iter()
            .map(|slot| slot.name.target().map(|o| cstring_at(bytes, o)).unwrap_or_default())
            .collect())
    }

    /// One mesh block per LOD; nodes without a format table have none
    fn read_lods(
        &self,
        bytes: &[u8],
        entity: &MeshEntity,
        vertices: &mut PartCursor<'_>,
        indices: &mut PartCursor<'_>,
    ) -> ParseResult<Vec<MeshBlock>> {
        let format_offset = match entity.node_format.target() {
            None | Some(0) => return Ok(Vec::new()),
            Some(offset) => offset,
        };

        let formats = records_at::<NodeFormat>(bytes, format_offset, usize::from(entity.lod_count))?;
        formats
            .iter()
            .enumerate()
            .map(|(lod, format)| {
                self.read_lod(bytes, format, vertices, indices)
                    .map_err(|e| e.with_context(format!("lod {lod}")))
            })
            .collect()
    }

    fn read_lod(
        &self,
        bytes: &[u8],
        format: &NodeFormat,
        vertices: &mut PartCursor<'_>,
        indices: &mut PartCursor<'_>,
    ) -> ParseResult<MeshBlock> {
        let surface_counts: Vec<u32> = match format.mesh_index_count.target() {
            Some(offset) => records_at::<U32Le>(bytes, offset, usize::from(format.object_count_a))?
                .into_iter()
                .map(|c| c.0)
                .collect(),
            None => Vec::new(),
        };
        let index_count: u64 = surface_counts.iter().map(|&c| u64::from(c)).sum();
        let index_count = u32::try_from(index_count)
            .map_err(|_| ParseError::structural(0, format!("index count {index_count} overflows")))?;

        let index_bytes = indices.take(index_count as usize * 2)?;
        let index_data = index_bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        // Material ids and bone lists are not stored in this format
        let mut offset = 0u32;
        let surfaces = (0..usize::from(format.object_count_b))
            .map(|i| {
                let count = surface_counts.get(i).copied().unwrap_or(0);
                let surface = Surface {
                    material_id: 0,
                    offset,
                    count,
                    bones: Vec::new(),
                };
                offset = offset.wrapping_add(count);
                surface
            })
            .collect();

        let layout = VertexLayout::from_id(format.vertex_layout_id)?;
        let vertex_bytes = vertices.take(format.vertex_count as usize * layout.stride())?;
        let decoded = layout.decode(vertex_bytes)?;

        let mut block = MeshBlock {
            vertex_count: format.vertex_count,
            indices: index_data,
            surfaces,
            ..MeshBlock::default()
        };
        block.positions[0] = pack_f32(&decoded.positions);
        block.normals[0] = pack_f32(&decoded.normals);
        block.tangents[0] = pack_f32(&decoded.tangents);
        block.bitangents[0] = pack_f32(&decoded.bitangents);
        block.uvs[0] = pack_f32(&decoded.uv0);
        block.uvs[1] = pack_f32(&decoded.uv1);

        Ok(block)
    }
}

/// Count, for every node, all nodes whose ancestor chain contains it.
///
/// `parents[i]` is the array index of node `i`'s parent; out-of-range
/// values (including [`NO_PARENT`]) end a chain. Chains longer than the
/// array are cut short, so a malformed cycle cannot loop forever.
pub fn count_descendants(parents: &[u16]) -> Vec<u16> {
    let mut counts = vec![0u16; parents.len()];

    for start in 0..parents.len() {
        let mut current = usize::from(parents[start]);
        let mut depth = 0;
        while current < parents.len() && depth < parents.len() {
            counts[current] = counts[current].saturating_add(1);
            current = usize::from(parents[current]);
            depth += 1;
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_descendants_tree() {
        // 0 ─┬─ 1 ── 3
        //    └─ 2
        // 4 (root)
        let parents = [NO_PARENT, 0, 0, 1, NO_PARENT];
        assert_eq!(count_descendants(&parents), vec![3, 1, 0, 0, 0]);
    }

    #[test]
    fn test_count_descendants_cycle_terminates() {
        let parents = [1, 0];
        let counts = count_descendants(&parents);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_wrong_part_count_is_unsupported() {
        let parts = vec![Bytes::new(); 3];
        let err = CompactMeshAssembler::new().assemble(&parts).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_part_cursor_bounds() {
        let data = [1u8, 2, 3];
        let mut cursor = PartCursor::new(&data);
        assert_eq!(cursor.take(2).unwrap(), &[1, 2]);
        assert!(matches!(cursor.take(2), Err(ParseError::OutOfBounds { .. })));
        assert_eq!(cursor.remaining(), 1);
    }
}
