// chromebreaker-parsers/src/msh/writer.rs
//! Serializes the mesh data model into MSH chunks

use std::io::{Seek, Write};

use tracing::debug;

use super::chunks::{ChunkTag, MSH_MAGIC};
use super::mesh::{MeshBlock, MshFile, MshNode, NAME_WIDTH};
use crate::binary::{write_fixed_name, Record};
use crate::chunk::ChunkWriter;
use crate::traits::ParseResult;

/// MSH writer. Stream slots with no data produce no chunk at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct MshWriter;

impl MshWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write `file` to `out`, starting at its current position
    pub fn write<W: Write + Seek>(&self, file: &MshFile, out: &mut W) -> ParseResult<()> {
        let mut chunks = ChunkWriter::new(out);

        chunks.begin(MSH_MAGIC, 0)?;
        file.header()?.encode(&mut chunks)?;

        if !file.materials.is_empty() {
            write_names(&mut chunks, ChunkTag::Materials, &file.materials)?;
        }
        if !file.surface_types.is_empty() {
            write_names(&mut chunks, ChunkTag::SurfaceTypes, &file.surface_types)?;
        }

        for node in &file.nodes {
            self.write_node(&mut chunks, node)?;
        }

        chunks.end()?;
        chunks.finish()?;
        Ok(())
    }

    /// Serialize into a fresh buffer
    pub fn to_bytes(&self, file: &MshFile) -> ParseResult<Vec<u8>> {
        let mut out = std::io::Cursor::new(Vec::new());
        self.write(file, &mut out)?;
        Ok(out.into_inner())
    }

    fn write_node<W: Write + Seek>(&self, chunks: &mut ChunkWriter<W>, node: &MshNode) -> ParseResult<()> {
        chunks.begin(ChunkTag::Node.to_u32(), 0)?;
        node.encode(chunks)?;

        for mesh in &node.meshes {
            self.write_mesh(chunks, mesh)?;
        }

        debug!(name = %node.name, meshes = node.meshes.len(), "Wrote node");
        chunks.end()
    }

    fn write_mesh<W: Write + Seek>(&self, chunks: &mut ChunkWriter<W>, mesh: &MeshBlock) -> ParseResult<()> {
        chunks.begin(ChunkTag::Mesh.to_u32(), 0)?;
        mesh.counts()?.encode(chunks)?;

        chunks.begin(ChunkTag::VFormat.to_u32(), 0)?;
        mesh.vertex_format().encode(chunks)?;
        chunks.end()?;

        let byte_slots = [
            (ChunkTag::Vertices(0), &mesh.positions[0]),
            (ChunkTag::Vertices(1), &mesh.positions[1]),
            (ChunkTag::Normals(0), &mesh.normals[0]),
            (ChunkTag::Normals(1), &mesh.normals[1]),
            (ChunkTag::Tangents(0), &mesh.tangents[0]),
            (ChunkTag::Tangents(1), &mesh.tangents[1]),
            (ChunkTag::Bitangents(0), &mesh.bitangents[0]),
            (ChunkTag::Bitangents(1), &mesh.bitangents[1]),
        ];
        for (tag, data) in byte_slots {
            write_slot(chunks, tag, data)?;
        }

        for (set, colors) in (0u8..).zip(&mesh.colors) {
            if colors.is_empty() {
                continue;
            }
            chunks.begin(ChunkTag::Colors(set).to_u32(), 0)?;
            for color in colors {
                color.encode(chunks)?;
            }
            chunks.end()?;
        }

        for (set, uvs) in (0u8..).zip(&mesh.uvs) {
            write_slot(chunks, ChunkTag::Uv(set), uvs)?;
        }

        if !mesh.indices.is_empty() {
            let bytes: Vec<u8> = mesh.indices.iter().flat_map(|i| i.to_le_bytes()).collect();
            chunks.leaf(ChunkTag::Indices.to_u32(), 0, &bytes)?;
        }

        if !mesh.surfaces.is_empty() {
            chunks.begin(ChunkTag::Surfaces1.to_u32(), 0)?;
            for surface in &mesh.surfaces {
                surface.write(chunks)?;
            }
            chunks.end()?;
        }

        chunks.end()
    }
}

fn write_slot<W: Write + Seek>(chunks: &mut ChunkWriter<W>, tag: ChunkTag, data: &[u8]) -> ParseResult<()> {
    if data.is_empty() {
        return Ok(());
    }
    chunks.leaf(tag.to_u32(), 0, data)
}

fn write_names<W: Write + Seek>(chunks: &mut ChunkWriter<W>, tag: ChunkTag, names: &[String]) -> ParseResult<()> {
    chunks.begin(tag.to_u32(), 0)?;
    for name in names {
        write_fixed_name(chunks, name, NAME_WIDTH)?;
    }
    chunks.end()
}
