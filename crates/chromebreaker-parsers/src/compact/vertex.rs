// chromebreaker-parsers/src/compact/vertex.rs
//! Packed vertex layouts of compact meshes.
//!
//! Layout 3 (`DlVertex32`) stores the whole tangent frame as one quantized
//! quaternion: rotating X, Y and Z by it yields tangent, bitangent and
//! normal. UVs are two half-float pairs.

use std::io::{self, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Quat, Vec3};
use half::f16;

use crate::binary::Record;
use crate::traits::{ParseError, ParseResult};

/// Squared quaternion length below which the identity is substituted
const DEGENERATE_QUAT_SQ: f32 = 1e-8;

/// Known vertex layout ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    DlVertex32,
}

impl VertexLayout {
    /// Map a format record's layout id; unknown ids are unsupported
    pub fn from_id(id: u16) -> ParseResult<Self> {
        match id {
            3 => Ok(VertexLayout::DlVertex32),
            other => Err(ParseError::UnsupportedFormat(format!("vertex layout {other}"))),
        }
    }

    /// Bytes per packed vertex
    pub fn stride(self) -> usize {
        match self {
            VertexLayout::DlVertex32 => DlVertex32::SIZE,
        }
    }

    /// Decode `data`, which must hold a whole number of vertices
    pub fn decode(self, data: &[u8]) -> ParseResult<DecodedVertices> {
        match self {
            VertexLayout::DlVertex32 => {
                let vertices = data
                    .chunks_exact(DlVertex32::SIZE)
                    .map(DlVertex32::decode)
                    .collect::<io::Result<Vec<_>>>()?;
                Ok(DecodedVertices::from_dl_vertex32(&vertices))
            }
        }
    }
}

/// 32-byte packed vertex
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DlVertex32 {
    pub position: [f32; 3],
    /// Tangent frame quaternion (x, y, z, w), each scaled by 32767
    pub rotation: [i16; 4],
    pub uv0: [f16; 2],
    pub uv1: [f16; 2],
    /// Unused downstream
    pub weights: [u8; 4],
}

impl DlVertex32 {
    /// Normalized tangent-frame rotation; identity when degenerate
    pub fn quaternion(&self) -> Quat {
        let [x, y, z, w] = self.rotation.map(|c| f32::from(c) / 32767.0);
        let q = Quat::from_xyzw(x, y, z, w);
        if q.length_squared() <= DEGENERATE_QUAT_SQ {
            Quat::IDENTITY
        } else {
            q.normalize()
        }
    }
}

impl Record for DlVertex32 {
    const SIZE: usize = 32;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        let mut position = [0f32; 3];
        r.read_f32_into::<LittleEndian>(&mut position)?;
        let mut rotation = [0i16; 4];
        r.read_i16_into::<LittleEndian>(&mut rotation)?;
        let mut halves = [0u16; 4];
        r.read_u16_into::<LittleEndian>(&mut halves)?;
        let mut weights = [0u8; 4];
        io::Read::read_exact(&mut r, &mut weights)?;

        Ok(Self {
            position,
            rotation,
            uv0: [f16::from_bits(halves[0]), f16::from_bits(halves[1])],
            uv1: [f16::from_bits(halves[2]), f16::from_bits(halves[3])],
            weights,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for v in self.position {
            out.write_f32::<LittleEndian>(v)?;
        }
        for c in self.rotation {
            out.write_i16::<LittleEndian>(c)?;
        }
        for h in self.uv0.iter().chain(&self.uv1) {
            out.write_u16::<LittleEndian>(h.to_bits())?;
        }
        out.write_all(&self.weights)
    }
}

/// Full-precision per-vertex streams
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedVertices {
    pub positions: Vec<[f32; 3]>,
    pub tangents: Vec<[f32; 3]>,
    pub bitangents: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uv0: Vec<[f32; 2]>,
    pub uv1: Vec<[f32; 2]>,
}

impl DecodedVertices {
    pub fn from_dl_vertex32(vertices: &[DlVertex32]) -> Self {
        let mut out = Self {
            positions: Vec::with_capacity(vertices.len()),
            tangents: Vec::with_capacity(vertices.len()),
            bitangents: Vec::with_capacity(vertices.len()),
            normals: Vec::with_capacity(vertices.len()),
            uv0: Vec::with_capacity(vertices.len()),
            uv1: Vec::with_capacity(vertices.len()),
        };

        for vertex in vertices {
            let q = vertex.quaternion();
            out.positions.push(vertex.position);
            out.tangents.push((q * Vec3::X).to_array());
            out.bitangents.push((q * Vec3::Y).to_array());
            out.normals.push((q * Vec3::Z).to_array());
            out.uv0.push(vertex.uv0.map(f16::to_f32));
            out.uv1.push(vertex.uv1.map(f16::to_f32));
        }

        out
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
