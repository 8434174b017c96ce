// chromebreaker-parsers/src/rp6/mod.rs
//! RP6 Resource Pack Parser
//!
//! RP6 packs hold every runtime resource of a level: meshes, textures,
//! animations and their fixup tables. Data is grouped into resource-type
//! sections, each of which may be compressed as a whole.
//!
//! # Format Structure
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Main header (36 bytes)                       │
//! ├──────────────────────────────────────────────┤
//! │ Section headers      (section_count × 20)    │
//! │ Physical entries     (physical_count × 16)   │
//! │ Logical entries      (name_count × 12)       │
//! │ Name offsets         (name_count × 4)        │
//! │ Name block           (names_block_size)      │
//! ├──────────────────────────────────────────────┤
//! │ Section data, raw or zlib/LZMA compressed    │
//! │ (offsets in 16-byte units)                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A logical resource is `part_count` consecutive physical entries starting
//! at `first_resource`. Parts inside a compressed section are sliced from the
//! inflated section buffer; parts of a stored section are read from the file
//! at `(section offset + part offset) × 16`.

mod archive;
mod compression;
mod entry;

pub use archive::{ResourceInfo, Rp6Archive};
pub use compression::{is_zlib_header, Inflated, SectionCodec, SectionDecompressor};
pub use entry::{LogicalEntry, MainHeader, PhysicalEntry, SectionHeader, OFFSET_UNIT, RP6_MAGIC};

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::binary::{read_bytes, read_fully, read_record, read_records, Record};
use crate::logging::instrument_phase;
use crate::source::FileSource;
use crate::traits::{Outcome, ParseError, ParseOptions, ParseResult, Parser};

/// Availability of one section's bytes after the decompression pass
#[derive(Debug, Clone)]
enum SectionState {
    /// Uncompressed; parts are read straight from the file
    Stored,
    Inflated(Bytes),
    /// Out of bounds, short or failed to decompress
    Unavailable,
}

/// Everything pulled out of one archive
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub archive: Rp6Archive,
    /// Resources with at least one resolved part, in logical order
    pub resources: Vec<ResourceInfo>,
    /// Logical resources dropped because no part resolved, with the reason
    pub skipped: Vec<(usize, String)>,
}

/// RP6 resource pack parser
///
/// `parse` reads only the index tables; `extract` also inflates sections
/// and resolves every logical resource to its byte parts.
#[derive(Debug, Default, Clone, Copy)]
pub struct Rp6Parser;

impl Rp6Parser {
    /// Create a new RP6 parser
    pub fn new() -> Self {
        Self
    }

    /// Read the header, the three index tables and the name block
    fn read_index<R: Read + Seek>(&self, reader: &mut R, options: &ParseOptions) -> ParseResult<Rp6Archive> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let header: MainHeader = read_record(reader)?;
        if options.strict_validation && header.magic != RP6_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: RP6_MAGIC.to_vec(),
                found: header.magic.to_vec(),
            });
        }

        let sections = read_table::<SectionHeader, _>(reader, header.section_count, file_len, "section headers")?;
        let physical = read_table::<PhysicalEntry, _>(reader, header.physical_count, file_len, "physical entries")?;

        // The logical table is sized by the name count; the header's own
        // logical count is informational.
        if header.logical_count != header.name_count {
            debug!(
                logical_count = header.logical_count,
                name_count = header.name_count,
                "Logical count differs from name count"
            );
        }
        let logical = read_table::<LogicalEntry, _>(reader, header.name_count, file_len, "logical entries")?;
        let name_offsets = read_table::<NameOffset, _>(reader, header.name_count, file_len, "name offsets")?
            .into_iter()
            .map(|n| n.0)
            .collect();

        let names = read_bytes(reader, header.names_block_size as usize, "name block")?;

        debug!(
            sections = sections.len(),
            physical = physical.len(),
            logical = logical.len(),
            "Read RP6 index"
        );

        Ok(Rp6Archive {
            header,
            sections,
            physical,
            logical,
            name_offsets,
            names: Bytes::from(names),
        })
    }

    /// Decompress every compressed section up front
    fn load_sections<R: Read + Seek>(
        &self,
        reader: &mut R,
        archive: &Rp6Archive,
        file_len: u64,
    ) -> ParseResult<Vec<SectionState>> {
        let mut states = Vec::with_capacity(archive.sections.len());

        for (index, section) in archive.sections.iter().enumerate() {
            let offset = section.byte_offset();
            if offset > file_len {
                warn!(section = index, offset, file_len, "Section offset beyond end of file");
                states.push(SectionState::Unavailable);
                continue;
            }

            if !section.is_compressed() {
                debug!(section = index, offset, size = section.data_size, "Section stored");
                states.push(SectionState::Stored);
                continue;
            }

            let compressed_size = u64::from(section.compressed_size);
            if offset + compressed_size > file_len {
                warn!(section = index, offset, compressed_size, "Compressed section extends beyond end of file");
                states.push(SectionState::Unavailable);
                continue;
            }

            reader.seek(SeekFrom::Start(offset))?;
            let mut compressed = vec![0u8; section.compressed_size as usize];
            let got = read_fully(reader, &mut compressed)?;
            if got != compressed.len() {
                warn!(section = index, got, expected = compressed.len(), "Short read of compressed section");
                states.push(SectionState::Unavailable);
                continue;
            }

            match SectionDecompressor::decompress(&compressed, section.data_size as usize) {
                Ok(inflated) => {
                    debug!(section = index, codec = %inflated.codec, size = inflated.data.len(), "Section inflated");
                    states.push(SectionState::Inflated(Bytes::from(inflated.data)));
                }
                Err(e) => {
                    warn!(section = index, error = %e, "Section unavailable");
                    states.push(SectionState::Unavailable);
                }
            }
        }

        Ok(states)
    }

    /// Resolve the bytes of one physical entry
    fn resolve_part<R: Read + Seek>(
        &self,
        reader: &mut R,
        archive: &Rp6Archive,
        sections: &[SectionState],
        physical_index: usize,
        file_len: u64,
    ) -> ParseResult<Bytes> {
        let entry = archive.physical.get(physical_index).ok_or(ParseError::OutOfBounds {
            offset: physical_index as u64,
            len: 1,
            limit: archive.physical.len() as u64,
        })?;

        let section_index = entry.section_index();
        let (section, state) = archive
            .sections
            .get(section_index)
            .zip(sections.get(section_index))
            .ok_or(ParseError::OutOfBounds {
                offset: section_index as u64,
                len: 1,
                limit: archive.sections.len() as u64,
            })?;

        let size = u64::from(entry.data_size);

        match state {
            SectionState::Unavailable => Err(ParseError::DecompressionFailed(format!(
                "section {section_index} is unavailable"
            ))),
            SectionState::Inflated(buffer) => {
                // Part offsets index the decompressed buffer, relative to the section start
                let start = entry.byte_offset();
                let end = start + size;
                if end > buffer.len() as u64 {
                    return Err(ParseError::OutOfBounds {
                        offset: start,
                        len: size,
                        limit: buffer.len() as u64,
                    });
                }
                Ok(buffer.slice(start as usize..end as usize))
            }
            SectionState::Stored => {
                let start = section
                    .byte_offset()
                    .checked_add(entry.byte_offset())
                    .filter(|start| start.checked_add(size).is_some_and(|end| end <= file_len))
                    .ok_or(ParseError::OutOfBounds {
                        offset: section.byte_offset().saturating_add(entry.byte_offset()),
                        len: size,
                        limit: file_len,
                    })?;

                reader.seek(SeekFrom::Start(start))?;
                let mut part = vec![0u8; entry.data_size as usize];
                let got = read_fully(reader, &mut part)?;
                if got != part.len() {
                    return Err(ParseError::OutOfBounds {
                        offset: start,
                        len: size,
                        limit: start + got as u64,
                    });
                }
                Ok(Bytes::from(part))
            }
        }
    }

    /// Resolve every logical resource; parts stop at the first failure
    fn resolve_resources<R: Read + Seek>(
        &self,
        reader: &mut R,
        archive: &Rp6Archive,
        sections: &[SectionState],
        file_len: u64,
    ) -> ParseResult<(Vec<ResourceInfo>, Vec<(usize, String)>)> {
        let mut resources = Vec::new();
        let mut skipped = Vec::new();

        for (index, logical) in archive.logical.iter().enumerate() {
            let name = archive.name_of(index);
            let first = logical.first_resource as usize;
            let mut parts = Vec::with_capacity(logical.part_count());
            let mut failure = None;

            for part in 0..logical.part_count() {
                let result = self.resolve_part(reader, archive, sections, first + part, file_len);
                match Outcome::from_result(result) {
                    Outcome::Ok(bytes) => parts.push(bytes),
                    Outcome::Skip(reason) => {
                        warn!(resource = index, %name, part, %reason, "Part unresolved; truncating resource");
                        failure = Some(reason);
                        break;
                    }
                    Outcome::Fatal(e) => {
                        return Err(e.with_context(format!("resource {index} ({name}) part {part}")));
                    }
                }
            }

            if parts.is_empty() {
                let reason = failure.unwrap_or_else(|| "no parts".to_string());
                debug!(resource = index, %name, %reason, "Dropping resource");
                skipped.push((index, reason));
                continue;
            }

            resources.push(ResourceInfo {
                logical_index: index,
                name,
                file_type: logical.file_type(),
                parts,
            });
        }

        Ok((resources, skipped))
    }

    /// Read the index, inflate sections and resolve all resources
    pub fn extract<R: Read + Seek>(&self, mut reader: R, options: &ParseOptions) -> ParseResult<Extraction> {
        let archive = instrument_phase("rp6.index", || self.read_index(&mut reader, options))?;
        let file_len = reader.seek(SeekFrom::End(0))?;

        let sections = instrument_phase("rp6.sections", || self.load_sections(&mut reader, &archive, file_len))?;
        let (resources, skipped) = instrument_phase("rp6.resources", || {
            self.resolve_resources(&mut reader, &archive, &sections, file_len)
        })?;

        let unavailable = sections.iter().filter(|s| matches!(s, SectionState::Unavailable)).count();
        info!(
            sections = sections.len(),
            unavailable,
            resources = resources.len(),
            skipped = skipped.len(),
            "Extracted RP6 archive"
        );

        Ok(Extraction {
            archive,
            resources,
            skipped,
        })
    }

    /// Extract from a path, memory-mapping large archives
    pub fn extract_file(&self, path: &Path, options: &ParseOptions) -> ParseResult<Extraction> {
        crate::log_archive_open!(self.name(), path);
        let start = std::time::Instant::now();

        let result = self.extract_path(path, options);
        match &result {
            Ok(extraction) => {
                crate::log_archive_done!(path, start.elapsed(), extraction.resources.len(), extraction.skipped.len());
            }
            Err(e) => {
                crate::log_archive_failed!(path, e);
            }
        }
        result
    }

    fn extract_path(&self, path: &Path, options: &ParseOptions) -> ParseResult<Extraction> {
        let source = FileSource::open(path, options)?;
        debug!(mapped = source.is_mapped(), "Opened archive");
        self.extract(source, options)
    }
}

impl Parser for Rp6Parser {
    type Output = Rp6Archive;

    fn extensions(&self) -> &[&str] {
        &["rpack", "rp6"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&RP6_MAGIC)
    }

    fn name(&self) -> &str {
        "RP6 Resource Pack Parser"
    }

    fn parse_with_options<R: Read + Seek>(&self, mut reader: R, options: &ParseOptions) -> ParseResult<Self::Output> {
        self.read_index(&mut reader, options)
    }
}

/// One entry of the name-offset table
struct NameOffset(u32);

impl Record for NameOffset {
    const SIZE: usize = 4;

    fn decode(buf: &[u8]) -> std::io::Result<Self> {
        let mut r = buf;
        Ok(Self(byteorder::ReadBytesExt::read_u32::<byteorder::LittleEndian>(&mut r)?))
    }

    fn encode<W: std::io::Write>(&self, out: &mut W) -> std::io::Result<()> {
        byteorder::WriteBytesExt::write_u32::<byteorder::LittleEndian>(out, self.0)
    }
}

/// Read a table of `count` records after checking it fits in the file
fn read_table<T: Record, R: Read + Seek>(reader: &mut R, count: u32, file_len: u64, what: &str) -> ParseResult<Vec<T>> {
    let position = reader.stream_position()?;
    let needed = u64::from(count) * T::SIZE as u64;
    if position + needed > file_len {
        return Err(ParseError::structural(
            position,
            format!("{what}: {count} records of {} bytes exceed file length {file_len}", T::SIZE),
        ));
    }
    read_records(reader, count as usize)
}
