// chromebreaker-parsers/src/compact/records.rs
//! Fixed-size records of the compact mesh image.
//!
//! Pointer fields are kept as raw [`Pointer`]s; they only mean something
//! once the image has gone through [`ResolvedImage`](super::ResolvedImage).

use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use super::fixups::Pointer;
use crate::binary::Record;
use crate::msh::{Aabb, Matrix3x4};

fn read_pointer<R: Read>(r: &mut R) -> io::Result<Pointer> {
    Ok(Pointer(r.read_u64::<LittleEndian>()?))
}

fn write_pointer<W: Write>(out: &mut W, pointer: Pointer) -> io::Result<()> {
    out.write_u64::<LittleEndian>(pointer.0)
}

/// Image header at offset 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshFileHeader {
    pub unique_name: Pointer,
    pub nodes: Pointer,
    pub surface_params: Pointer,
    pub materials_db: Pointer,
    pub morph_names: Pointer,
    pub coll_trees: [Pointer; 3],
    pub anim_script_name: Pointer,
    pub morph_presets: Pointer,
    pub mesh_entity: Pointer,
    pub nodes_count: u32,
    pub roots_count: u32,
    pub surfaces_count: u32,
    pub entity_count: u32,
}

impl Record for MeshFileHeader {
    const SIZE: usize = 104;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            unique_name: read_pointer(&mut r)?,
            nodes: read_pointer(&mut r)?,
            surface_params: read_pointer(&mut r)?,
            materials_db: read_pointer(&mut r)?,
            morph_names: read_pointer(&mut r)?,
            coll_trees: [read_pointer(&mut r)?, read_pointer(&mut r)?, read_pointer(&mut r)?],
            anim_script_name: read_pointer(&mut r)?,
            morph_presets: read_pointer(&mut r)?,
            mesh_entity: read_pointer(&mut r)?,
            nodes_count: r.read_u32::<LittleEndian>()?,
            roots_count: r.read_u32::<LittleEndian>()?,
            surfaces_count: r.read_u32::<LittleEndian>()?,
            entity_count: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for pointer in [
            self.unique_name,
            self.nodes,
            self.surface_params,
            self.materials_db,
            self.morph_names,
            self.coll_trees[0],
            self.coll_trees[1],
            self.coll_trees[2],
            self.anim_script_name,
            self.morph_presets,
            self.mesh_entity,
        ] {
            write_pointer(out, pointer)?;
        }
        out.write_u32::<LittleEndian>(self.nodes_count)?;
        out.write_u32::<LittleEndian>(self.roots_count)?;
        out.write_u32::<LittleEndian>(self.surfaces_count)?;
        out.write_u32::<LittleEndian>(self.entity_count)
    }
}

/// Materials database: where the slot array lives and how long it is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialDatabase {
    pub slots: Pointer,
    pub surface_count: u16,
    pub material_count: u16,
    pub unknown: u32,
}

impl Record for MaterialDatabase {
    const SIZE: usize = 16;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            slots: read_pointer(&mut r)?,
            surface_count: r.read_u16::<LittleEndian>()?,
            material_count: r.read_u16::<LittleEndian>()?,
            unknown: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_pointer(out, self.slots)?;
        out.write_u16::<LittleEndian>(self.surface_count)?;
        out.write_u16::<LittleEndian>(self.material_count)?;
        out.write_u32::<LittleEndian>(self.unknown)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialSlot {
    pub pointer_a: Pointer,
    /// Offset of the null-terminated material name
    pub name: Pointer,
    pub pointer_b: Pointer,
    pub vertex_layout: u32,
    pub unknown_b: u32,
}

impl Record for MaterialSlot {
    const SIZE: usize = 32;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            pointer_a: read_pointer(&mut r)?,
            name: read_pointer(&mut r)?,
            pointer_b: read_pointer(&mut r)?,
            vertex_layout: r.read_u32::<LittleEndian>()?,
            unknown_b: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_pointer(out, self.pointer_a)?;
        write_pointer(out, self.name)?;
        write_pointer(out, self.pointer_b)?;
        out.write_u32::<LittleEndian>(self.vertex_layout)?;
        out.write_u32::<LittleEndian>(self.unknown_b)
    }
}

/// One node of the compact node table
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeshEntity {
    pub local: Matrix3x4,
    pub bind: Matrix3x4,
    pub bounds: Aabb,
    pub name: Pointer,
    pub unknown1: Pointer,
    /// Per-LOD format table, `lod_count` records long
    pub node_format: Pointer,
    pub unknown: [Pointer; 4],
    pub coll_tree_geom: Pointer,
    pub coll_tree_hull: Pointer,
    pub flags: u32,
    pub node_index: u16,
    pub parent: u16,
    pub kind: u8,
    pub lod_count: u8,
    pub children_count: u16,
    pub unknown7: u32,
    pub reserved: [u8; 16],
}

impl Record for MeshEntity {
    const SIZE: usize = 224;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        let local = Matrix3x4::read(&mut r)?;
        let bind = Matrix3x4::read(&mut r)?;
        let bounds = Aabb::read(&mut r)?;
        let name = read_pointer(&mut r)?;
        let unknown1 = read_pointer(&mut r)?;
        let node_format = read_pointer(&mut r)?;
        let unknown = [
            read_pointer(&mut r)?,
            read_pointer(&mut r)?,
            read_pointer(&mut r)?,
            read_pointer(&mut r)?,
        ];
        let coll_tree_geom = read_pointer(&mut r)?;
        let coll_tree_hull = read_pointer(&mut r)?;
        let flags = r.read_u32::<LittleEndian>()?;
        let node_index = r.read_u16::<LittleEndian>()?;
        let parent = r.read_u16::<LittleEndian>()?;
        let kind = r.read_u8()?;
        let lod_count = r.read_u8()?;
        let children_count = r.read_u16::<LittleEndian>()?;
        let unknown7 = r.read_u32::<LittleEndian>()?;
        let mut reserved = [0u8; 16];
        r.read_exact(&mut reserved)?;

        Ok(Self {
            local,
            bind,
            bounds,
            name,
            unknown1,
            node_format,
            unknown,
            coll_tree_geom,
            coll_tree_hull,
            flags,
            node_index,
            parent,
            kind,
            lod_count,
            children_count,
            unknown7,
            reserved,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.local.write(out)?;
        self.bind.write(out)?;
        self.bounds.write(out)?;
        write_pointer(out, self.name)?;
        write_pointer(out, self.unknown1)?;
        write_pointer(out, self.node_format)?;
        for pointer in self.unknown {
            write_pointer(out, pointer)?;
        }
        write_pointer(out, self.coll_tree_geom)?;
        write_pointer(out, self.coll_tree_hull)?;
        out.write_u32::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.node_index)?;
        out.write_u16::<LittleEndian>(self.parent)?;
        out.write_u8(self.kind)?;
        out.write_u8(self.lod_count)?;
        out.write_u16::<LittleEndian>(self.children_count)?;
        out.write_u32::<LittleEndian>(self.unknown7)?;
        out.write_all(&self.reserved)
    }
}

/// Per-LOD geometry description
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFormat {
    pub unknown_a: Pointer,
    pub surface_material_index: Pointer,
    /// Length of the per-surface index-count array
    pub object_count_a: u16,
    pub field_a: u16,
    /// Number of surfaces emitted
    pub object_count_b: u16,
    pub vertex_layout_id: u16,
    /// Per-surface index counts, `object_count_a` u32 values
    pub mesh_index_count: Pointer,
    pub unknown_d: Pointer,
    pub vertex_buffer: u32,
    pub vertex_count: u32,
    pub field_c: u32,
    pub fields_dg: [u16; 4],
    pub field_h: u32,
}

impl Record for NodeFormat {
    const SIZE: usize = 64;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            unknown_a: read_pointer(&mut r)?,
            surface_material_index: read_pointer(&mut r)?,
            object_count_a: r.read_u16::<LittleEndian>()?,
            field_a: r.read_u16::<LittleEndian>()?,
            object_count_b: r.read_u16::<LittleEndian>()?,
            vertex_layout_id: r.read_u16::<LittleEndian>()?,
            mesh_index_count: read_pointer(&mut r)?,
            unknown_d: read_pointer(&mut r)?,
            vertex_buffer: r.read_u32::<LittleEndian>()?,
            vertex_count: r.read_u32::<LittleEndian>()?,
            field_c: r.read_u32::<LittleEndian>()?,
            fields_dg: [
                r.read_u16::<LittleEndian>()?,
                r.read_u16::<LittleEndian>()?,
                r.read_u16::<LittleEndian>()?,
                r.read_u16::<LittleEndian>()?,
            ],
            field_h: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write_pointer(out, self.unknown_a)?;
        write_pointer(out, self.surface_material_index)?;
        out.write_u16::<LittleEndian>(self.object_count_a)?;
        out.write_u16::<LittleEndian>(self.field_a)?;
        out.write_u16::<LittleEndian>(self.object_count_b)?;
        out.write_u16::<LittleEndian>(self.vertex_layout_id)?;
        write_pointer(out, self.mesh_index_count)?;
        write_pointer(out, self.unknown_d)?;
        out.write_u32::<LittleEndian>(self.vertex_buffer)?;
        out.write_u32::<LittleEndian>(self.vertex_count)?;
        out.write_u32::<LittleEndian>(self.field_c)?;
        for field in self.fields_dg {
            out.write_u16::<LittleEndian>(field)?;
        }
        out.write_u32::<LittleEndian>(self.field_h)
    }
}

/// Physical surface material of a collision surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SurfaceId(pub u32);

const SURFACE_NAMES: [&str; 21] = [
    "Unknown", "Flexible", "Fire", "Water", "Snow", "Sand", "Gravel", "Grass", "Ground", "Mud", "Flesh",
    "Rubber", "Wood", "Plastic", "Tarmac", "Glass", "Ice", "Metal", "Stone", "Canvas", "Lava",
];

impl SurfaceId {
    /// Engine name, `None` for ids outside the known range
    pub fn name(self) -> Option<&'static str> {
        SURFACE_NAMES.get(self.0 as usize).copied()
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Record for SurfaceId {
    const SIZE: usize = 4;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self(r.read_u32::<LittleEndian>()?))
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.0)
    }
}
