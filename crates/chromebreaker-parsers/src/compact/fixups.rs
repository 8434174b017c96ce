// chromebreaker-parsers/src/compact/fixups.rs
//! Pointer fixup table and the relocated mesh image
//!
//! On disk, pointer fields inside a compact mesh image hold 1-based offsets
//! (0 or 0xFFFF meaning null). The fixup table lists every such slot. After
//! resolution a slot holds a 0-based offset or [`NULL_OFFSET`].

use std::io;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::{debug, warn};

use crate::binary::{record_at, records_at, Record};
use crate::traits::{ParseError, ParseResult};

/// Resolved value of a null pointer slot
pub const NULL_OFFSET: u64 = u64::MAX;

/// Legacy null marker in unresolved slots
const LEGACY_NULL: u64 = 0xFFFF;

/// Class-tagged object record; kept for graph walking, not replayed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectResolve {
    pub offset: i32,
    pub class_id: u32,
    pub element_count: u32,
}

impl Record for ObjectResolve {
    const SIZE: usize = 12;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            offset: r.read_i32::<LittleEndian>()?,
            class_id: r.read_u32::<LittleEndian>()?,
            element_count: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_i32::<LittleEndian>(self.offset)?;
        out.write_u32::<LittleEndian>(self.class_id)?;
        out.write_u32::<LittleEndian>(self.element_count)
    }
}

/// One little-endian u32 table element
#[derive(Debug, Clone, Copy)]
pub(crate) struct U32Le(pub u32);

impl Record for U32Le {
    const SIZE: usize = 4;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self(r.read_u32::<LittleEndian>()?))
    }

    fn encode<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.0)
    }
}

/// Relocation table of a compact mesh (mesh part 2)
///
/// Layout: memory size, object count, visible object count, the objects,
/// pointer-slot count, the slot offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshFixups {
    pub memory_size: u32,
    pub visible_resolve_count: u32,
    pub resolves: Vec<ObjectResolve>,
    pub pointer_slots: Vec<u32>,
}

impl MeshFixups {
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        let memory_size = record_at::<U32Le>(data, 0)?.0;
        let resolve_count = record_at::<U32Le>(data, 4)?.0 as usize;
        let visible_resolve_count = record_at::<U32Le>(data, 8)?.0;

        let resolves = records_at::<ObjectResolve>(data, 12, resolve_count)?;

        let slots_at = 12 + resolve_count * ObjectResolve::SIZE;
        let slot_count = record_at::<U32Le>(data, slots_at)?.0 as usize;
        let pointer_slots = records_at::<U32Le>(data, slots_at + 4, slot_count)?
            .into_iter()
            .map(|slot| slot.0)
            .collect();

        Ok(Self {
            memory_size,
            visible_resolve_count,
            resolves,
            pointer_slots,
        })
    }

    /// Serialize in the on-disk layout
    pub fn to_bytes(&self) -> ParseResult<Vec<u8>> {
        let mut out = Vec::with_capacity(16 + self.resolves.len() * ObjectResolve::SIZE + self.pointer_slots.len() * 4);
        out.write_u32::<LittleEndian>(self.memory_size)?;
        out.write_u32::<LittleEndian>(table_len(self.resolves.len(), "object")?)?;
        out.write_u32::<LittleEndian>(self.visible_resolve_count)?;
        for resolve in &self.resolves {
            resolve.encode(&mut out)?;
        }
        out.write_u32::<LittleEndian>(table_len(self.pointer_slots.len(), "pointer slot")?)?;
        for &slot in &self.pointer_slots {
            out.write_u32::<LittleEndian>(slot)?;
        }
        Ok(out)
    }
}

fn table_len(len: usize, what: &str) -> ParseResult<u32> {
    u32::try_from(len).map_err(|_| ParseError::structural(0, format!("{what} table length {len} does not fit 32 bits")))
}

/// Map a stored 1-based pointer to a 0-based offset or [`NULL_OFFSET`]
pub fn resolve_pointer(raw: u64) -> u64 {
    match raw {
        0 | LEGACY_NULL => NULL_OFFSET,
        k => k - 1,
    }
}

/// A pointer field read from a resolved image
///
/// Only the low 32 bits are significant; all-ones there is null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pointer(pub u64);

impl Pointer {
    /// Byte offset into the image, `None` when null
    pub fn target(self) -> Option<usize> {
        match self.0 as u32 {
            u32::MAX => None,
            offset => Some(offset as usize),
        }
    }

    pub fn is_null(self) -> bool {
        self.target().is_none()
    }
}

/// A mesh image whose pointer slots have been rewritten exactly once
///
/// Constructing one consumes the raw image, so a second resolution pass
/// over the same bytes cannot happen.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    bytes: Vec<u8>,
}

impl ResolvedImage {
    /// Rewrite every pointer slot listed in `fixups`.
    ///
    /// A slot with 8 bytes left is rewritten in full. A slot in the last
    /// 4 to 7 bytes of the image has only its low 32-bit word resolved,
    /// which is all [`Pointer::target`] reads. A slot without 4 bytes left
    /// fails the whole image, since a partly resolved image is unusable.
    pub fn resolve(mut image: Vec<u8>, fixups: &MeshFixups) -> ParseResult<Self> {
        let mut low_word_only = 0usize;

        for (index, &slot) in fixups.pointer_slots.iter().enumerate() {
            let start = slot as usize;
            let len = image.len();

            if let Some(field) = start.checked_add(8).and_then(|end| image.get_mut(start..end)) {
                let raw = LittleEndian::read_u64(field);
                LittleEndian::write_u64(field, resolve_pointer(raw));
            } else if let Some(field) = start.checked_add(4).and_then(|end| image.get_mut(start..end)) {
                let raw = LittleEndian::read_u32(field);
                LittleEndian::write_u32(field, resolve_pointer(u64::from(raw)) as u32);
                low_word_only += 1;
            } else {
                warn!(index, slot, len, "Pointer slot out of range");
                return Err(ParseError::OutOfBounds {
                    offset: u64::from(slot),
                    len: 4,
                    limit: len as u64,
                });
            }
        }

        debug!(
            slots = fixups.pointer_slots.len(),
            low_word_only,
            "Resolved pointer slots"
        );

        Ok(Self { bytes: image })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Pointer stored at `offset`
    pub fn pointer_at(&self, offset: usize) -> ParseResult<Pointer> {
        Ok(Pointer(record_at::<U64Le>(&self.bytes, offset)?.0))
    }
}

impl AsRef<[u8]> for ResolvedImage {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Clone, Copy)]
struct U64Le(u64);

impl Record for U64Le {
    const SIZE: usize = 8;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self(r.read_u64::<LittleEndian>()?))
    }

    fn encode<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u64::<LittleEndian>(self.0)
    }
}
