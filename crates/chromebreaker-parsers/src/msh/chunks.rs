// chromebreaker-parsers/src/msh/chunks.rs
//! MSH chunk tags

use serde::{Deserialize, Serialize};

/// Root tag: `'M' | 'S' << 8 | 'H' << 16`
pub const MSH_MAGIC: u32 = 0x0048_534D;

/// Chunk types found in MSH files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkTag {
    /// File root; inline node/material/surface-type counts
    Root,
    /// 64-byte material names
    Materials,
    /// 64-byte surface type names
    SurfaceTypes,
    /// Legacy node layout, not decoded
    NodeOld,
    /// Node with row-major 4x3 matrices
    NodeOldMtx43ByRows,
    /// Node
    Node,
    /// Mesh block; inline vertex/index/surface counts
    Mesh,
    /// Vertex format descriptor
    VFormat,
    /// Position stream, slot 0 / slot 1
    Vertices(u8),
    /// Normal stream, slot 0 / slot 1
    Normals(u8),
    /// Tangent stream, slot 0 / slot 1
    Tangents(u8),
    /// Bitangent stream, slot 0 / slot 1
    Bitangents(u8),
    /// Vertex colors, sets 0-3
    Colors(u8),
    /// Texture coordinates, sets 0-3
    Uv(u8),
    /// 16-bit index buffer
    Indices,
    /// Legacy surface list
    Surfaces,
    /// Surface list with bone tables
    Surfaces1,
    /// Alternate-numbered position stream
    Vertices0,
    /// Alternate-numbered normal stream
    Normals0,
    /// Alternate-numbered tangent stream
    Tangents0,
    /// Morph targets
    Targets,
    /// Blend weights
    VBlends,
    /// Optimized blend weights
    VBlendsOpt,
    /// Animation tracks
    TrackPos,
    TrackRot,
    TrackScl,
    /// Cloth simulation data
    Cloth,
    /// Collision map
    ColMap,
    /// Packed collision trees
    CollTreeGeom,
    CollTreeHull,
    CollTreeTerrain,
    /// Meta information
    MetaInfo,
    /// Unknown chunk type
    Unknown(u32),
}

impl ChunkTag {
    /// Convert from raw u32 chunk tag
    pub fn from_u32(value: u32) -> Self {
        match value {
            MSH_MAGIC => ChunkTag::Root,
            0x500 => ChunkTag::Materials,
            0x700 => ChunkTag::SurfaceTypes,
            0x001 => ChunkTag::NodeOld,
            0x002 => ChunkTag::NodeOldMtx43ByRows,
            0x003 => ChunkTag::Node,
            0x100 => ChunkTag::Mesh,
            0x101 => ChunkTag::Vertices(0),
            0x102 => ChunkTag::Normals(0),
            0x103 => ChunkTag::Tangents(0),
            0x104 => ChunkTag::Targets,
            0x110..=0x113 => ChunkTag::Colors((value - 0x110) as u8),
            0x120..=0x123 => ChunkTag::Uv((value - 0x120) as u8),
            0x130 => ChunkTag::VBlends,
            0x131 => ChunkTag::VBlendsOpt,
            0x140 => ChunkTag::Indices,
            0x150 => ChunkTag::Surfaces,
            0x151 => ChunkTag::Surfaces1,
            0x160 => ChunkTag::VFormat,
            0x170 => ChunkTag::Vertices0,
            0x171 => ChunkTag::Vertices(1),
            0x180 => ChunkTag::Normals0,
            0x181 => ChunkTag::Normals(1),
            0x190 => ChunkTag::Tangents0,
            0x191 => ChunkTag::Tangents(1),
            0x195 => ChunkTag::Bitangents(0),
            0x196 => ChunkTag::Bitangents(1),
            0x200 => ChunkTag::TrackPos,
            0x210 => ChunkTag::TrackRot,
            0x220 => ChunkTag::TrackScl,
            0x300 => ChunkTag::Cloth,
            0x600 => ChunkTag::ColMap,
            0x601 => ChunkTag::CollTreeGeom,
            0x602 => ChunkTag::CollTreeHull,
            0x603 => ChunkTag::CollTreeTerrain,
            0x900 => ChunkTag::MetaInfo,
            other => ChunkTag::Unknown(other),
        }
    }

    /// Convert to raw u32 chunk tag
    pub fn to_u32(self) -> u32 {
        match self {
            ChunkTag::Root => MSH_MAGIC,
            ChunkTag::Materials => 0x500,
            ChunkTag::SurfaceTypes => 0x700,
            ChunkTag::NodeOld => 0x001,
            ChunkTag::NodeOldMtx43ByRows => 0x002,
            ChunkTag::Node => 0x003,
            ChunkTag::Mesh => 0x100,
            ChunkTag::Vertices(0) => 0x101,
            ChunkTag::Vertices(_) => 0x171,
            ChunkTag::Normals(0) => 0x102,
            ChunkTag::Normals(_) => 0x181,
            ChunkTag::Tangents(0) => 0x103,
            ChunkTag::Tangents(_) => 0x191,
            ChunkTag::Bitangents(0) => 0x195,
            ChunkTag::Bitangents(_) => 0x196,
            ChunkTag::Targets => 0x104,
            ChunkTag::Colors(set) => 0x110 + u32::from(set.min(3)),
            ChunkTag::Uv(set) => 0x120 + u32::from(set.min(3)),
            ChunkTag::VBlends => 0x130,
            ChunkTag::VBlendsOpt => 0x131,
            ChunkTag::Indices => 0x140,
            ChunkTag::Surfaces => 0x150,
            ChunkTag::Surfaces1 => 0x151,
            ChunkTag::VFormat => 0x160,
            ChunkTag::Vertices0 => 0x170,
            ChunkTag::Normals0 => 0x180,
            ChunkTag::Tangents0 => 0x190,
            ChunkTag::TrackPos => 0x200,
            ChunkTag::TrackRot => 0x210,
            ChunkTag::TrackScl => 0x220,
            ChunkTag::Cloth => 0x300,
            ChunkTag::ColMap => 0x600,
            ChunkTag::CollTreeGeom => 0x601,
            ChunkTag::CollTreeHull => 0x602,
            ChunkTag::CollTreeTerrain => 0x603,
            ChunkTag::MetaInfo => 0x900,
            ChunkTag::Unknown(v) => v,
        }
    }

    /// Recognized chunks whose contents are deliberately not decoded
    pub fn is_skipped_feature(self) -> bool {
        matches!(
            self,
            ChunkTag::NodeOld
                | ChunkTag::Targets
                | ChunkTag::VBlends
                | ChunkTag::VBlendsOpt
                | ChunkTag::Surfaces
                | ChunkTag::Vertices0
                | ChunkTag::Normals0
                | ChunkTag::Tangents0
                | ChunkTag::TrackPos
                | ChunkTag::TrackRot
                | ChunkTag::TrackScl
                | ChunkTag::Cloth
                | ChunkTag::ColMap
                | ChunkTag::CollTreeGeom
                | ChunkTag::CollTreeHull
                | ChunkTag::CollTreeTerrain
                | ChunkTag::MetaInfo
        )
    }
}

impl From<ChunkTag> for u32 {
    fn from(tag: ChunkTag) -> Self {
        tag.to_u32()
    }
}
