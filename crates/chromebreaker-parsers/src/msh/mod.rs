// chromebreaker-parsers/src/msh/mod.rs
//! MSH chunk mesh format
//!
//! An MSH file is a single root chunk holding name tables and node chunks;
//! every node chunk holds its mesh blocks, and every mesh block holds one
//! chunk per populated vertex stream.

pub mod chunks;
pub mod mesh;
pub mod writer;

pub use chunks::{ChunkTag, MSH_MAGIC};
pub use mesh::*;
pub use writer::MshWriter;

use std::io::{Read, Seek};

use tracing::{debug, trace, warn};

use crate::binary::{records_at, Record};
use crate::chunk::{Chunk, ChunkReader};
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser};

/// MSH parser
#[derive(Debug, Default, Clone, Copy)]
pub struct MshParser;

impl MshParser {
    pub fn new() -> Self {
        Self
    }

    /// Read a whole file from a chunk stream positioned at the root header
    pub fn read<R: Read + Seek>(
        &self,
        reader: &mut ChunkReader<R>,
        options: &ParseOptions,
    ) -> ParseResult<MshFile> {
        let root = reader.next_chunk()?;
        if ChunkTag::from_u32(root.header.tag) != ChunkTag::Root {
            return Err(ParseError::InvalidMagic {
                expected: MSH_MAGIC.to_le_bytes().to_vec(),
                found: root.header.tag.to_le_bytes().to_vec(),
            });
        }

        let header: MshHeader = read_inline(reader, &root)?;
        let mut file = MshFile::default();

        while reader.position()? < root.end {
            let child = reader.next_chunk()?;
            match ChunkTag::from_u32(child.header.tag) {
                ChunkTag::Materials => {
                    file.materials = read_names(reader, &child, header.material_count)?;
                }
                ChunkTag::SurfaceTypes => {
                    file.surface_types = read_names(reader, &child, header.surface_type_count)?;
                }
                ChunkTag::Node | ChunkTag::NodeOldMtx43ByRows => {
                    let node = self.read_node(reader, &child, options)?;
                    debug!(name = %node.name, meshes = node.meshes.len(), "Read node");
                    file.nodes.push(node);
                }
                tag => skip_chunk(reader, &child, tag, options, "root")?,
            }
            reader.skip_to(child.end)?;
        }

        if file.nodes.len() != header.node_count as usize {
            warn!(
                declared = header.node_count,
                found = file.nodes.len(),
                "Node count does not match root header"
            );
        }

        Ok(file)
    }

    fn read_node<R: Read + Seek>(
        &self,
        reader: &mut ChunkReader<R>,
        chunk: &Chunk,
        options: &ParseOptions,
    ) -> ParseResult<MshNode> {
        let mut node: MshNode = read_inline(reader, chunk)?;

        while reader.position()? < chunk.end {
            let child = reader.next_chunk()?;
            match ChunkTag::from_u32(child.header.tag) {
                ChunkTag::Mesh => {
                    let mesh = self
                        .read_mesh(reader, &child, options)
                        .map_err(|e| e.with_context(format!("node '{}'", node.name)))?;
                    node.meshes.push(mesh);
                }
                tag => skip_chunk(reader, &child, tag, options, "node")?,
            }
            reader.skip_to(child.end)?;
        }

        Ok(node)
    }

    fn read_mesh<R: Read + Seek>(
        &self,
        reader: &mut ChunkReader<R>,
        chunk: &Chunk,
        options: &ParseOptions,
    ) -> ParseResult<MeshBlock> {
        let counts: MeshCounts = read_inline(reader, chunk)?;
        let mut mesh = MeshBlock {
            vertex_count: counts.vertex_count,
            ..MeshBlock::default()
        };

        while reader.position()? < chunk.end {
            let child = reader.next_chunk()?;
            let tag = ChunkTag::from_u32(child.header.tag);
            trace!(?tag, size = child.header.payload_size, "Mesh child");

            match tag {
                ChunkTag::VFormat => {
                    let format: VertexFormat = read_inline(reader, &child)?;
                    mesh.apply_vertex_format(&format);
                }
                ChunkTag::Vertices(slot) => mesh.positions[slot_index(slot, 2)?] = reader.read_payload(&child)?,
                ChunkTag::Normals(slot) => mesh.normals[slot_index(slot, 2)?] = reader.read_payload(&child)?,
                ChunkTag::Tangents(slot) => mesh.tangents[slot_index(slot, 2)?] = reader.read_payload(&child)?,
                ChunkTag::Bitangents(slot) => mesh.bitangents[slot_index(slot, 2)?] = reader.read_payload(&child)?,
                ChunkTag::Uv(set) => mesh.uvs[slot_index(set, 4)?] = reader.read_payload(&child)?,
                ChunkTag::Colors(set) => {
                    let payload = reader.read_payload(&child)?;
                    mesh.colors[slot_index(set, 4)?] =
                        records_at(&payload, 0, payload.len() / Color::SIZE)?;
                }
                ChunkTag::Indices => {
                    let payload = reader.read_payload(&child)?;
                    mesh.indices = payload
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                        .collect();
                }
                ChunkTag::Surfaces1 => {
                    let payload = reader.read_payload(&child)?;
                    let mut cursor = payload.as_slice();
                    mesh.surfaces = (0..counts.surface_count)
                        .map(|i| {
                            Surface::read(&mut cursor).map_err(|e| {
                                ParseError::structural(child.start, format!("surface {i}: {e}"))
                            })
                        })
                        .collect::<ParseResult<_>>()?;
                }
                tag => skip_chunk(reader, &child, tag, options, "mesh")?,
            }
            reader.skip_to(child.end)?;
        }

        if mesh.indices.len() != counts.index_count as usize {
            warn!(
                declared = counts.index_count,
                found = mesh.indices.len(),
                "Index count does not match mesh header"
            );
        }

        Ok(mesh)
    }
}

impl Parser for MshParser {
    type Output = MshFile;

    fn extensions(&self) -> &[&str] {
        &["msh"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(b"MSH\0")
    }

    fn name(&self) -> &str {
        "MSH Chunk Mesh Parser"
    }

    fn parse_with_options<R: Read + Seek>(
        &self,
        reader: R,
        options: &ParseOptions,
    ) -> ParseResult<MshFile> {
        let mut chunks = ChunkReader::new(reader)?;
        self.read(&mut chunks, options)
    }
}

/// Read the fixed record at the start of a chunk's inline payload and
/// skip any trailing inline bytes.
fn read_inline<T: Record, R: Read + Seek>(reader: &mut ChunkReader<R>, chunk: &Chunk) -> ParseResult<T> {
    if (chunk.header.payload_size as usize) < T::SIZE {
        return Err(ParseError::structural(
            chunk.start,
            format!(
                "chunk 0x{:08X} inline payload {} is smaller than {} bytes",
                chunk.header.tag,
                chunk.header.payload_size,
                T::SIZE
            ),
        ));
    }
    let record = reader.read_record::<T>()?;
    reader.skip_to(chunk.payload_end())?;
    Ok(record)
}

fn read_names<R: Read + Seek>(reader: &mut ChunkReader<R>, chunk: &Chunk, count: u32) -> ParseResult<Vec<String>> {
    let payload = reader.read_payload(chunk)?;
    let available = payload.len() / NAME_WIDTH;
    if available < count as usize {
        warn!(declared = count, available, "Name table shorter than declared count");
    }
    Ok(payload
        .chunks_exact(NAME_WIDTH)
        .take(count as usize)
        .map(crate::binary::fixed_name)
        .collect())
}

fn skip_chunk<R: Read + Seek>(
    reader: &mut ChunkReader<R>,
    chunk: &Chunk,
    tag: ChunkTag,
    options: &ParseOptions,
    scope: &str,
) -> ParseResult<()> {
    if matches!(tag, ChunkTag::Unknown(_)) && !options.skip_unknown_chunks {
        return Err(ParseError::structural(
            chunk.start,
            format!("unknown chunk 0x{:08X} in {scope}", chunk.header.tag),
        ));
    }
    if tag.is_skipped_feature() {
        debug!(?tag, scope, "Skipping unsupported chunk");
    } else {
        debug!(tag = format_args!("0x{:08X}", chunk.header.tag), scope, "Skipping chunk");
    }
    reader.skip_to(chunk.end)
}

fn slot_index(slot: u8, slots: usize) -> ParseResult<usize> {
    let index = usize::from(slot);
    if index < slots {
        Ok(index)
    } else {
        Err(ParseError::Invariant(format!("stream slot {slot} out of range 0..{slots}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkWriter;
    use std::io::{Cursor, Write};

    fn sample_file() -> MshFile {
        let mut mesh = MeshBlock {
            vertex_count: 1,
            ..MeshBlock::default()
        };
        mesh.positions[0] = crate::binary::pack_f32(&[[1.0f32, 2.0, 3.0]]);
        mesh.indices = vec![0, 0, 0];
        mesh.surfaces = vec![Surface { material_id: 0, offset: 0, count: 3, bones: vec![] }];

        MshFile {
            nodes: vec![MshNode {
                name: "root".into(),
                kind: NodeKind::Mesh,
                lod_count: 1,
                meshes: vec![mesh],
                ..MshNode::default()
            }],
            materials: vec!["metal_plate".into()],
            surface_types: vec![],
        }
    }

    fn write(file: &MshFile) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        MshWriter::new().write(file, &mut out).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_read_back_written_file() {
        let file = sample_file();
        let parsed = MshParser::new().parse(Cursor::new(write(&file))).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn test_rejects_wrong_root_tag() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.leaf(0x1234, 0, &[0; 12]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = MshParser::new().parse(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidMagic { .. }));
    }

    #[test]
    fn test_unknown_and_skipped_chunks_are_ignored() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.begin(MSH_MAGIC, 0).unwrap();
        MshHeader::default().encode(&mut writer).unwrap();
        writer.leaf(ChunkTag::CollTreeGeom.to_u32(), 0, &[7; 40]).unwrap();
        writer.leaf(0xA00, 3, &[1; 5]).unwrap();
        writer.end().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let parsed = MshParser::new().parse(Cursor::new(bytes)).unwrap();
        assert!(parsed.nodes.is_empty());
    }

    #[test]
    fn test_unknown_chunk_rejected_when_not_skipping() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.begin(MSH_MAGIC, 0).unwrap();
        MshHeader::default().encode(&mut writer).unwrap();
        writer.leaf(0xA00, 3, &[1; 5]).unwrap();
        writer.end().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let options = ParseOptions { skip_unknown_chunks: false, ..ParseOptions::default() };
        let err = MshParser::new()
            .parse_with_options(Cursor::new(bytes), &options)
            .unwrap_err();
        assert!(matches!(err, ParseError::Structural { .. }));
    }

    #[test]
    fn test_trailing_inline_bytes_skipped() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.begin(MSH_MAGIC, 0).unwrap();
        MshHeader { node_count: 0, material_count: 1, surface_type_count: 0 }
            .encode(&mut writer)
            .unwrap();
        writer.write_all(&[0xEE; 8]).unwrap();
        let mut names = Vec::new();
        crate::binary::write_fixed_name(&mut names, "glass", NAME_WIDTH).unwrap();
        writer.leaf(ChunkTag::Materials.to_u32(), 0, &names).unwrap();
        writer.end().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let parsed = MshParser::new().parse(Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.materials, vec!["glass".to_string()]);
    }

    #[test]
    fn test_truncated_file_is_structural() {
        let mut bytes = write(&sample_file());
        bytes.truncate(bytes.len() - 4);
        let err = MshParser::new().parse(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ParseError::Structural { .. }));
    }

    #[test]
    fn test_colors_decode_as_bgra() {
        let mut file = sample_file();
        file.nodes[0].meshes[0].colors[1] = vec![Color { b: 1, g: 2, r: 3, a: 4 }; 2];

        let parsed = MshParser::new().parse(Cursor::new(write(&file))).unwrap();
        assert_eq!(parsed.nodes[0].meshes[0].colors[1], file.nodes[0].meshes[0].colors[1]);
        assert!(parsed.nodes[0].meshes[0].colors[0].is_empty());
    }

    #[test]
    fn test_lists_survive_without_stored_counts() {
        let mut mesh = MeshBlock::default();
        mesh.surfaces = vec![Surface { material_id: 2, offset: 0, count: 0, bones: vec![5] }];
        let file = MshFile {
            nodes: vec![MshNode { meshes: vec![mesh], ..MshNode::default() }],
            materials: vec!["a".into(), "b".into()],
            surface_types: vec!["Metal".into()],
        };

        let parsed = MshParser::new().parse(Cursor::new(write(&file))).unwrap();
        assert_eq!(parsed.materials, file.materials);
        assert_eq!(parsed.surface_types, file.surface_types);
        assert_eq!(parsed.nodes[0].meshes[0].surfaces, file.nodes[0].meshes[0].surfaces);
        assert_eq!(parsed, file);
    }
}
