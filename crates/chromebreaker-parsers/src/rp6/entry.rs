// chromebreaker-parsers/src/rp6/entry.rs
//! RP6 header and index table records

use std::io::{self, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use crate::binary::Record;

/// Expected magic when strict validation is enabled
pub const RP6_MAGIC: [u8; 4] = *b"RP6L";

/// Offsets in the index tables count in units of one physical entry
pub const OFFSET_UNIT: u64 = PhysicalEntry::SIZE as u64;

/// Archive header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MainHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub flags: u32,
    pub physical_count: u32,
    pub section_count: u32,
    pub name_count: u32,
    pub names_block_size: u32,
    pub logical_count: u32,
    pub sector_alignment: u32,
}

impl Record for MainHeader {
    const SIZE: usize = 36;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        let mut magic = [0u8; 4];
        io::Read::read_exact(&mut r, &mut magic)?;
        Ok(Self {
            magic,
            version: r.read_u32::<LittleEndian>()?,
            flags: r.read_u32::<LittleEndian>()?,
            physical_count: r.read_u32::<LittleEndian>()?,
            section_count: r.read_u32::<LittleEndian>()?,
            name_count: r.read_u32::<LittleEndian>()?,
            names_block_size: r.read_u32::<LittleEndian>()?,
            logical_count: r.read_u32::<LittleEndian>()?,
            sector_alignment: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.magic)?;
        for value in [
            self.version,
            self.flags,
            self.physical_count,
            self.section_count,
            self.name_count,
            self.names_block_size,
            self.logical_count,
            self.sector_alignment,
        ] {
            out.write_u32::<LittleEndian>(value)?;
        }
        Ok(())
    }
}

/// Resource-type section: one top-level data region, optionally compressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionHeader {
    pub bitfields: u32,
    /// File offset in `OFFSET_UNIT`s
    pub data_offset: u32,
    /// Uncompressed size in bytes
    pub data_size: u32,
    /// Compressed size in bytes; 0 when stored raw
    pub compressed_size: u32,
    pub resource_count: u32,
}

impl SectionHeader {
    pub fn is_compressed(&self) -> bool {
        self.compressed_size > 0
    }

    /// Absolute byte offset of the section data
    pub fn byte_offset(&self) -> u64 {
        u64::from(self.data_offset) * OFFSET_UNIT
    }
}

impl Record for SectionHeader {
    const SIZE: usize = 20;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            bitfields: r.read_u32::<LittleEndian>()?,
            data_offset: r.read_u32::<LittleEndian>()?,
            data_size: r.read_u32::<LittleEndian>()?,
            compressed_size: r.read_u32::<LittleEndian>()?,
            resource_count: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for value in [
            self.bitfields,
            self.data_offset,
            self.data_size,
            self.compressed_size,
            self.resource_count,
        ] {
            out.write_u32::<LittleEndian>(value)?;
        }
        Ok(())
    }
}

/// One contiguous byte range inside a section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhysicalEntry {
    pub bitfields: u32,
    /// Offset in `OFFSET_UNIT`s, relative to the owning section
    pub data_offset: u32,
    pub data_size: u32,
    pub compressed_size: i16,
    pub referenced_resource: i16,
}

impl PhysicalEntry {
    /// Index of the owning section
    pub fn section_index(&self) -> usize {
        (self.bitfields & 0xFF) as usize
    }

    /// Byte offset relative to the section start
    pub fn byte_offset(&self) -> u64 {
        u64::from(self.data_offset) * OFFSET_UNIT
    }
}

impl Record for PhysicalEntry {
    const SIZE: usize = 16;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            bitfields: r.read_u32::<LittleEndian>()?,
            data_offset: r.read_u32::<LittleEndian>()?,
            data_size: r.read_u32::<LittleEndian>()?,
            compressed_size: r.read_i16::<LittleEndian>()?,
            referenced_resource: r.read_i16::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.bitfields)?;
        out.write_u32::<LittleEndian>(self.data_offset)?;
        out.write_u32::<LittleEndian>(self.data_size)?;
        out.write_i16::<LittleEndian>(self.compressed_size)?;
        out.write_i16::<LittleEndian>(self.referenced_resource)
    }
}

/// A named asset made of consecutive physical entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogicalEntry {
    /// Bits 16..24: file type; bits 0..8: part count
    pub bitfields: u32,
    pub first_name_index: u32,
    pub first_resource: u32,
}

impl LogicalEntry {
    pub fn file_type(&self) -> u32 {
        (self.bitfields >> 16) & 0xFF
    }

    pub fn part_count(&self) -> usize {
        (self.bitfields & 0xFF) as usize
    }

    /// Pack a file type and part count into the bitfield layout
    pub fn pack_bitfields(file_type: u8, part_count: u8) -> u32 {
        (u32::from(file_type) << 16) | u32::from(part_count)
    }
}

impl Record for LogicalEntry {
    const SIZE: usize = 12;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            bitfields: r.read_u32::<LittleEndian>()?,
            first_name_index: r.read_u32::<LittleEndian>()?,
            first_resource: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.bitfields)?;
        out.write_u32::<LittleEndian>(self.first_name_index)?;
        out.write_u32::<LittleEndian>(self.first_resource)
    }
}
