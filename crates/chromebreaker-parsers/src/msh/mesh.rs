// chromebreaker-parsers/src/msh/mesh.rs
//! Mesh data model shared by the chunk reader, the compact-mesh assembler
//! and the chunk writer.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use crate::binary::{fixed_name, read_f32s, write_f32s, write_fixed_name, Record};
use crate::traits::{ParseError, ParseResult};

/// Width of every stored name field
pub const NAME_WIDTH: usize = 64;

/// Parent index meaning "no parent"
pub const NO_PARENT: u16 = 0xFFFF;

/// Decoded chunk mesh file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MshFile {
    pub nodes: Vec<MshNode>,
    pub materials: Vec<String>,
    pub surface_types: Vec<String>,
}

impl MshFile {
    /// Total mesh blocks across all nodes
    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().map(|n| n.meshes.len()).sum()
    }

    /// Total vertices across all mesh blocks
    pub fn vertex_count(&self) -> u64 {
        self.nodes
            .iter()
            .flat_map(|n| &n.meshes)
            .map(|m| u64::from(m.vertex_count))
            .sum()
    }

    /// Root counts as written to disk, taken from the list lengths
    pub fn header(&self) -> ParseResult<MshHeader> {
        Ok(MshHeader {
            node_count: count_u32(self.nodes.len(), "node")?,
            material_count: count_u32(self.materials.len(), "material")?,
            surface_type_count: count_u32(self.surface_types.len(), "surface type")?,
        })
    }
}

/// A list length as a 32-bit count field
fn count_u32(len: usize, what: &str) -> ParseResult<u32> {
    u32::try_from(len).map_err(|_| ParseError::structural(0, format!("{what} count {len} does not fit 32 bits")))
}

/// Counts stored inline in the root chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MshHeader {
    pub node_count: u32,
    pub material_count: u32,
    pub surface_type_count: u32,
}

impl Record for MshHeader {
    const SIZE: usize = 12;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            node_count: r.read_u32::<LittleEndian>()?,
            material_count: r.read_u32::<LittleEndian>()?,
            surface_type_count: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.node_count)?;
        out.write_u32::<LittleEndian>(self.material_count)?;
        out.write_u32::<LittleEndian>(self.surface_type_count)
    }
}

/// Affine transform stored as four rows of three floats
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Matrix3x4(pub [f32; 12]);

impl Matrix3x4 {
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, //
        0.0, 0.0, 1.0, //
        0.0, 0.0, 0.0,
    ]);

    /// Translation row
    pub fn translation(&self) -> [f32; 3] {
        [self.0[9], self.0[10], self.0[11]]
    }

    pub(crate) fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self(read_f32s::<12, _>(r)?))
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_f32s(out, &self.0)
    }
}

impl Default for Matrix3x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned bounding box as origin plus extent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Aabb {
    pub origin: [f32; 3],
    pub extent: [f32; 3],
}

impl Aabb {
    pub(crate) fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            origin: read_f32s::<3, _>(r)?,
            extent: read_f32s::<3, _>(r)?,
        })
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_f32s(out, &self.origin)?;
        write_f32s(out, &self.extent)
    }
}

/// What a node carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// Transform-only node
    #[default]
    Empty,
    /// Geometry node
    Mesh,
    /// Bones, helpers and other engine-specific kinds
    Other(u8),
}

impl NodeKind {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => NodeKind::Empty,
            1 => NodeKind::Mesh,
            other => NodeKind::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            NodeKind::Empty => 0,
            NodeKind::Mesh => 1,
            NodeKind::Other(v) => v,
        }
    }
}

/// One node of the flat node hierarchy
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MshNode {
    pub name: String,
    /// Index of the parent node; `None` for roots
    pub parent: Option<u16>,
    pub kind: NodeKind,
    pub local: Matrix3x4,
    /// Bind / rest pose
    pub bind: Matrix3x4,
    pub bounds: Aabb,
    pub lod_count: u8,
    /// Number of nodes below this one, transitively
    pub descendant_count: u16,
    /// One block per LOD or sub-mesh
    pub meshes: Vec<MeshBlock>,
}

impl MshNode {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Fixed node record. Mesh blocks are not part of it; they follow as
/// child chunks.
impl Record for MshNode {
    const SIZE: usize = NAME_WIDTH + 8 + 48 + 48 + 24;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let name = fixed_name(&buf[..NAME_WIDTH]);
        let mut r = &buf[NAME_WIDTH..];
        let parent = r.read_u16::<LittleEndian>()?;
        let descendant_count = r.read_u16::<LittleEndian>()?;
        let kind = NodeKind::from_u8(r.read_u8()?);
        let lod_count = r.read_u8()?;
        let _reserved = r.read_u16::<LittleEndian>()?;

        Ok(Self {
            name,
            parent: (parent != NO_PARENT).then_some(parent),
            kind,
            local: Matrix3x4::read(&mut r)?,
            bind: Matrix3x4::read(&mut r)?,
            bounds: Aabb::read(&mut r)?,
            lod_count,
            descendant_count,
            meshes: Vec::new(),
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_fixed_name(out, &self.name, NAME_WIDTH)?;
        out.write_u16::<LittleEndian>(self.parent.unwrap_or(NO_PARENT))?;
        out.write_u16::<LittleEndian>(self.descendant_count)?;
        out.write_u8(self.kind.to_u8())?;
        out.write_u8(self.lod_count)?;
        out.write_u16::<LittleEndian>(0)?;
        self.local.write(out)?;
        self.bind.write(out)?;
        self.bounds.write(out)
    }
}

/// Element encoding of a vertex stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VertexEncoding {
    Float3,
    Float2,
    Other(u32),
}

impl VertexEncoding {
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => VertexEncoding::Float3,
            1 => VertexEncoding::Float2,
            other => VertexEncoding::Other(other),
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            VertexEncoding::Float3 => 0,
            VertexEncoding::Float2 => 1,
            VertexEncoding::Other(v) => v,
        }
    }
}

/// Position stream format: encoding, bias+scale and stride
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamFormat {
    pub encoding: VertexEncoding,
    /// xyz bias and w scale applied at decode time
    pub bias_scale: [f32; 4],
    pub stride: u32,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            encoding: VertexEncoding::Float3,
            bias_scale: [0.0, 0.0, 0.0, 1.0],
            stride: 12,
        }
    }
}

/// Format of a non-position attribute
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttributeFormat {
    pub encoding: VertexEncoding,
    pub scale: f32,
    pub stride: u32,
}

impl AttributeFormat {
    pub const FLOAT3: Self = Self {
        encoding: VertexEncoding::Float3,
        scale: 1.0,
        stride: 12,
    };

    pub const FLOAT2: Self = Self {
        encoding: VertexEncoding::Float2,
        scale: 1.0,
        stride: 8,
    };

    fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            encoding: VertexEncoding::from_u32(r.read_u32::<LittleEndian>()?),
            scale: r.read_f32::<LittleEndian>()?,
            stride: r.read_u32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.encoding.to_u32())?;
        out.write_f32::<LittleEndian>(self.scale)?;
        out.write_u32::<LittleEndian>(self.stride)
    }
}

/// Per-mesh format descriptor stored in the `VFormat` chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VertexFormat {
    pub position: StreamFormat,
    pub normal: AttributeFormat,
    /// Shared by tangents and bitangents
    pub tangent: AttributeFormat,
    pub uv: AttributeFormat,
}

impl Record for VertexFormat {
    const SIZE: usize = 60;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        let position = StreamFormat {
            encoding: VertexEncoding::from_u32(r.read_u32::<LittleEndian>()?),
            bias_scale: read_f32s::<4, _>(&mut r)?,
            stride: r.read_u32::<LittleEndian>()?,
        };
        Ok(Self {
            position,
            normal: AttributeFormat::read(&mut r)?,
            tangent: AttributeFormat::read(&mut r)?,
            uv: AttributeFormat::read(&mut r)?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.position.encoding.to_u32())?;
        write_f32s(out, &self.position.bias_scale)?;
        out.write_u32::<LittleEndian>(self.position.stride)?;
        self.normal.write(out)?;
        self.tangent.write(out)?;
        self.uv.write(out)
    }
}

/// Counts stored inline in a mesh chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshCounts {
    pub vertex_count: u32,
    pub index_count: u32,
    pub surface_count: u32,
    pub target_count: u32,
}

impl Record for MeshCounts {
    const SIZE: usize = 16;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            vertex_count: r.read_u32::<LittleEndian>()?,
            index_count: r.read_u32::<LittleEndian>()?,
            surface_count: r.read_u32::<LittleEndian>()?,
            target_count: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.vertex_count)?;
        out.write_u32::<LittleEndian>(self.index_count)?;
        out.write_u32::<LittleEndian>(self.surface_count)?;
        out.write_u32::<LittleEndian>(self.target_count)
    }
}

/// BGRA vertex color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Record for Color {
    const SIZE: usize = 4;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        match *buf {
            [b, g, r, a, ..] => Ok(Self { b, g, r, a }),
            _ => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&[self.b, self.g, self.r, self.a])
    }
}

/// Contiguous index range drawn with one material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Surface {
    pub material_id: u16,
    /// First index
    pub offset: u32,
    /// Number of indices
    pub count: u32,
    /// Bones influencing this surface; empty when unskinned
    pub bones: Vec<u16>,
}

impl Surface {
    pub(crate) fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let material_id = r.read_u16::<LittleEndian>()?;
        let offset = r.read_u32::<LittleEndian>()?;
        let count = r.read_u32::<LittleEndian>()?;
        let bone_count = r.read_u16::<LittleEndian>()?;
        let mut bones = vec![0u16; usize::from(bone_count)];
        r.read_u16_into::<LittleEndian>(&mut bones)?;
        Ok(Self {
            material_id,
            offset,
            count,
            bones,
        })
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let bone_count = u16::try_from(self.bones.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "surface has more than 65535 bones"))?;
        out.write_u16::<LittleEndian>(self.material_id)?;
        out.write_u32::<LittleEndian>(self.offset)?;
        out.write_u32::<LittleEndian>(self.count)?;
        out.write_u16::<LittleEndian>(bone_count)?;
        self.bones
            .iter()
            .try_for_each(|&bone| out.write_u16::<LittleEndian>(bone))
    }
}

/// Geometry for one LOD or sub-mesh of a node.
///
/// Stream slots hold raw little-endian bytes in the encoding given by the
/// matching format; an empty buffer means the slot is absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshBlock {
    pub vertex_count: u32,

    pub position_format: [StreamFormat; 2],
    pub normal_format: AttributeFormat,
    pub tangent_format: AttributeFormat,
    pub bitangent_format: AttributeFormat,
    pub uv_format: AttributeFormat,

    /// Slot 1 is the optional target stream
    #[serde(skip)]
    pub positions: [Vec<u8>; 2],
    #[serde(skip)]
    pub normals: [Vec<u8>; 2],
    #[serde(skip)]
    pub tangents: [Vec<u8>; 2],
    #[serde(skip)]
    pub bitangents: [Vec<u8>; 2],
    #[serde(skip)]
    pub colors: [Vec<Color>; 4],
    #[serde(skip)]
    pub uvs: [Vec<u8>; 4],
    #[serde(skip)]
    pub indices: Vec<u16>,
    pub surfaces: Vec<Surface>,
}

impl Default for MeshBlock {
    fn default() -> Self {
        Self {
            vertex_count: 0,
            position_format: [StreamFormat::default(); 2],
            normal_format: AttributeFormat::FLOAT3,
            tangent_format: AttributeFormat::FLOAT3,
            bitangent_format: AttributeFormat::FLOAT3,
            uv_format: AttributeFormat::FLOAT2,
            positions: Default::default(),
            normals: Default::default(),
            tangents: Default::default(),
            bitangents: Default::default(),
            colors: Default::default(),
            uvs: Default::default(),
            indices: Vec::new(),
            surfaces: Vec::new(),
        }
    }
}

impl MeshBlock {
    /// Format descriptor as stored on disk
    pub fn vertex_format(&self) -> VertexFormat {
        VertexFormat {
            position: self.position_format[0],
            normal: self.normal_format,
            tangent: self.tangent_format,
            uv: self.uv_format,
        }
    }

    /// Apply a stored descriptor. Position slot 1 mirrors slot 0 and the
    /// bitangent format mirrors the tangent format.
    pub fn apply_vertex_format(&mut self, format: &VertexFormat) {
        self.position_format = [format.position; 2];
        self.normal_format = format.normal;
        self.tangent_format = format.tangent;
        self.bitangent_format = format.tangent;
        self.uv_format = format.uv;
    }

    /// Inline counts; index and surface counts come from the lists
    pub(crate) fn counts(&self) -> ParseResult<MeshCounts> {
        Ok(MeshCounts {
            vertex_count: self.vertex_count,
            index_count: count_u32(self.indices.len(), "index")?,
            surface_count: count_u32(self.surfaces.len(), "surface")?,
            target_count: 0,
        })
    }

    /// Number of populated stream slots
    pub fn populated_streams(&self) -> usize {
        let byte_slots = self
            .positions
            .iter()
            .chain(&self.normals)
            .chain(&self.tangents)
            .chain(&self.bitangents)
            .chain(&self.uvs)
            .filter(|s| !s.is_empty())
            .count();
        byte_slots + self.colors.iter().filter(|c| !c.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::record_at;

    #[test]
    fn test_node_record_width() {
        let mut out = Vec::new();
        MshNode::default().encode(&mut out).unwrap();
        assert_eq!(out.len(), MshNode::SIZE);
        assert_eq!(MshNode::SIZE, 192);
    }

    #[test]
    fn test_node_record_fields() {
        let node = MshNode {
            name: "hull_lod0".into(),
            parent: Some(3),
            kind: NodeKind::Mesh,
            lod_count: 2,
            descendant_count: 5,
            bounds: Aabb { origin: [1.0, 2.0, 3.0], extent: [0.5; 3] },
            ..MshNode::default()
        };
        let mut out = Vec::new();
        node.encode(&mut out).unwrap();

        let decoded: MshNode = record_at(&out, 0).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_no_parent_sentinel() {
        let mut out = Vec::new();
        MshNode::default().encode(&mut out).unwrap();
        assert_eq!(&out[NAME_WIDTH..NAME_WIDTH + 2], &[0xFF, 0xFF]);
        assert!(MshNode::decode(&out).unwrap().is_root());
    }

    #[test]
    fn test_vertex_format_defaults() {
        let block = MeshBlock::default();
        let fmt = block.vertex_format();
        assert_eq!(fmt.position.stride, 12);
        assert_eq!(fmt.position.bias_scale, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(fmt.uv.encoding, VertexEncoding::Float2);
        assert_eq!(fmt.uv.stride, 8);

        let mut out = Vec::new();
        fmt.encode(&mut out).unwrap();
        assert_eq!(out.len(), VertexFormat::SIZE);
    }

    #[test]
    fn test_apply_vertex_format_mirrors_slots() {
        let mut block = MeshBlock::default();
        let mut fmt = block.vertex_format();
        fmt.position.stride = 16;
        fmt.tangent = AttributeFormat { encoding: VertexEncoding::Other(9), scale: 2.0, stride: 4 };
        block.apply_vertex_format(&fmt);

        assert_eq!(block.position_format[1].stride, 16);
        assert_eq!(block.bitangent_format, fmt.tangent);
    }

    #[test]
    fn test_surface_with_bones() {
        let surface = Surface { material_id: 2, offset: 30, count: 60, bones: vec![1, 4, 9] };
        let mut out = Vec::new();
        surface.write(&mut out).unwrap();
        assert_eq!(out.len(), 12 + 6);
        assert_eq!(Surface::read(&mut out.as_slice()).unwrap(), surface);
    }

    #[test]
    fn test_counts_follow_lists() {
        let file = MshFile {
            nodes: vec![MshNode::default()],
            materials: vec!["a".into(), "b".into()],
            ..MshFile::default()
        };
        assert_eq!(
            file.header().unwrap(),
            MshHeader { node_count: 1, material_count: 2, surface_type_count: 0 }
        );

        let block = MeshBlock {
            vertex_count: 4,
            indices: vec![0, 1, 2],
            surfaces: vec![Surface { material_id: 0, offset: 0, count: 3, bones: vec![] }],
            ..MeshBlock::default()
        };
        let counts = block.counts().unwrap();
        assert_eq!((counts.vertex_count, counts.index_count, counts.surface_count), (4, 3, 1));
    }

    #[test]
    fn test_populated_streams() {
        let mut block = MeshBlock::default();
        assert_eq!(block.populated_streams(), 0);
        block.positions[0] = vec![0; 12];
        block.colors[2] = vec![Color::default()];
        assert_eq!(block.populated_streams(), 2);
    }
}
