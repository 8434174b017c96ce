// chromebreaker-parsers/src/chunk/mod.rs
//! Nested chunk container codec
//!
//! Every chunk starts with a 16-byte header `{tag, version, total_size,
//! payload_size}`. `total_size` covers the header and all nested chunks;
//! `payload_size` covers the inline data that precedes the first child.

mod writer;

pub use writer::ChunkWriter;

use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use crate::binary::{read_record, Record};
use crate::traits::{ParseError, ParseResult};

/// Encoded header width
pub const CHUNK_HEADER_SIZE: u64 = 16;

/// Chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Raw chunk tag
    pub tag: u32,
    /// Chunk version
    pub version: u32,
    /// Header plus everything nested inside
    pub total_size: u32,
    /// Inline data size
    pub payload_size: u32,
}

impl Record for ChunkHeader {
    const SIZE: usize = CHUNK_HEADER_SIZE as usize;

    fn decode(buf: &[u8]) -> io::Result<Self> {
        let mut r = buf;
        Ok(Self {
            tag: r.read_u32::<LittleEndian>()?,
            version: r.read_u32::<LittleEndian>()?,
            total_size: r.read_u32::<LittleEndian>()?,
            payload_size: r.read_u32::<LittleEndian>()?,
        })
    }

    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.tag)?;
        out.write_u32::<LittleEndian>(self.version)?;
        out.write_u32::<LittleEndian>(self.total_size)?;
        out.write_u32::<LittleEndian>(self.payload_size)
    }
}

/// A header together with its validated position in the stream
#[derive(Debug, Clone, Copy)]
pub struct Chunk {
    pub header: ChunkHeader,
    /// Offset of the header
    pub start: u64,
    /// First byte after the header
    pub data_start: u64,
    /// One past the last byte of this chunk
    pub end: u64,
}

impl Chunk {
    /// End of the inline payload, clamped to the chunk end
    pub fn payload_end(&self) -> u64 {
        (self.data_start + u64::from(self.header.payload_size)).min(self.end)
    }
}

/// Forward-only reader over a chunk stream
pub struct ChunkReader<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Wrap a stream, measuring its length
    pub fn new(mut inner: R) -> ParseResult<Self> {
        let pos = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self { inner, len })
    }

    /// Total stream length
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the stream is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current offset
    pub fn position(&mut self) -> ParseResult<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Consume exactly one header
    pub fn read_header(&mut self) -> ParseResult<ChunkHeader> {
        read_record(&mut self.inner)
    }

    /// Compute and validate the end offset of a chunk starting at `start`
    pub fn chunk_end(&self, start: u64, header: &ChunkHeader) -> ParseResult<u64> {
        let total = u64::from(header.total_size);
        if total < CHUNK_HEADER_SIZE {
            return Err(ParseError::structural(
                start,
                format!("chunk 0x{:08X} declares total size {total} below header size", header.tag),
            ));
        }
        let end = start + total;
        if end > self.len {
            return Err(ParseError::structural(
                start,
                format!(
                    "chunk 0x{:08X} ends at {end}, past stream length {}",
                    header.tag, self.len
                ),
            ));
        }
        Ok(end)
    }

    /// Read and validate the next header
    pub fn next_chunk(&mut self) -> ParseResult<Chunk> {
        let start = self.position()?;
        let header = self.read_header()?;
        let end = self.chunk_end(start, &header)?;
        Ok(Chunk {
            header,
            start,
            data_start: start + CHUNK_HEADER_SIZE,
            end,
        })
    }

    /// Seek forward to `offset`. Backward targets are logged and ignored.
    pub fn skip_to(&mut self, offset: u64) -> ParseResult<()> {
        let pos = self.position()?;
        if offset < pos {
            warn!(offset, position = pos, "refusing to seek backwards in chunk stream");
            return Ok(());
        }
        if offset > pos {
            self.inner.seek(SeekFrom::Start(offset))?;
        }
        Ok(())
    }

    /// Read the whole inline payload of `chunk`
    pub fn read_payload(&mut self, chunk: &Chunk) -> ParseResult<Vec<u8>> {
        let inline = u64::from(chunk.header.payload_size);
        if chunk.data_start + inline > chunk.end {
            return Err(ParseError::structural(
                chunk.start,
                format!(
                    "chunk 0x{:08X} payload {inline} exceeds its total size {}",
                    chunk.header.tag, chunk.header.total_size
                ),
            ));
        }
        self.skip_to(chunk.data_start)?;
        crate::binary::read_bytes(&mut self.inner, inline as usize, "chunk payload")
    }

    /// Read a fixed record from the current position
    pub fn read_record<T: Record>(&mut self) -> ParseResult<T> {
        read_record(&mut self.inner)
    }

    /// Give back the wrapped stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(tag: u32, total: u32, payload: u32) -> Vec<u8> {
        let mut out = Vec::new();
        ChunkHeader { tag, version: 1, total_size: total, payload_size: payload }
            .encode(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_read_header_consumes_sixteen_bytes() {
        let mut bytes = header_bytes(7, 20, 4);
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();

        let header = reader.read_header().unwrap();
        assert_eq!(header.tag, 7);
        assert_eq!(reader.position().unwrap(), 16);
    }

    #[test]
    fn test_total_size_below_header_rejected() {
        let mut bytes = header_bytes(7, 8, 0);
        bytes.extend_from_slice(&[0; 32]);
        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();

        let err = reader.next_chunk().unwrap_err();
        assert!(matches!(err, ParseError::Structural { offset: 0, .. }));
        // Nothing past the header was consumed.
        assert_eq!(reader.position().unwrap(), 16);
    }

    #[test]
    fn test_chunk_past_stream_end_rejected() {
        let bytes = header_bytes(7, 64, 0);
        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.next_chunk().is_err());
    }

    #[test]
    fn test_skip_to_is_forward_only() {
        let mut bytes = header_bytes(7, 24, 8);
        bytes.extend_from_slice(&[0; 8]);
        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();

        let chunk = reader.next_chunk().unwrap();
        reader.skip_to(chunk.end).unwrap();
        assert_eq!(reader.position().unwrap(), 24);

        reader.skip_to(4).unwrap();
        assert_eq!(reader.position().unwrap(), 24);
    }

    #[test]
    fn test_payload_larger_than_chunk_rejected() {
        let mut bytes = header_bytes(7, 20, 12);
        bytes.extend_from_slice(&[0; 4]);
        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();

        let chunk = reader.next_chunk().unwrap();
        assert!(reader.read_payload(&chunk).is_err());
    }
}
