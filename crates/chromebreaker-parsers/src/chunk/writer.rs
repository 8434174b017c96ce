//! Stack-based chunk writer with header back-patching

use std::io::{self, Seek, SeekFrom, Write};

use super::{ChunkHeader, CHUNK_HEADER_SIZE};
use crate::binary::Record;
use crate::traits::{ParseError, ParseResult};

#[derive(Debug)]
struct OpenChunk {
    tag: u32,
    version: u32,
    header_pos: u64,
    data_start: u64,
    /// Frozen once the first child chunk begins
    inline_size: Option<u64>,
}

/// Writes nested chunks to a seekable stream.
///
/// `begin` reserves a zeroed header; `end` patches it with the final sizes
/// and returns the stream to the end of the written data. Payload bytes go
/// through the `Write` impl.
pub struct ChunkWriter<W: Write + Seek> {
    inner: W,
    stack: Vec<OpenChunk>,
}

impl<W: Write + Seek> ChunkWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            stack: Vec::new(),
        }
    }

    /// Open a chunk
    pub fn begin(&mut self, tag: u32, version: u32) -> ParseResult<()> {
        let header_pos = self.inner.stream_position()?;

        if let Some(parent) = self.stack.last_mut() {
            if parent.inline_size.is_none() {
                parent.inline_size = Some(header_pos - parent.data_start);
            }
        }

        self.inner.write_all(&[0u8; CHUNK_HEADER_SIZE as usize])?;
        self.stack.push(OpenChunk {
            tag,
            version,
            header_pos,
            data_start: header_pos + CHUNK_HEADER_SIZE,
            inline_size: None,
        });
        Ok(())
    }

    /// Close the innermost open chunk
    pub fn end(&mut self) -> ParseResult<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| ParseError::Invariant("ChunkWriter::end called with no open chunk".into()))?;

        let end_pos = self.inner.stream_position()?;
        let total = end_pos - frame.header_pos;
        let payload = frame.inline_size.unwrap_or(end_pos - frame.data_start);

        let header = ChunkHeader {
            tag: frame.tag,
            version: frame.version,
            total_size: size_field(total, frame.tag)?,
            payload_size: size_field(payload, frame.tag)?,
        };

        self.inner.seek(SeekFrom::Start(frame.header_pos))?;
        header.encode(&mut self.inner)?;
        self.inner.seek(SeekFrom::Start(end_pos))?;
        Ok(())
    }

    /// Open a chunk, write `payload` inline and close it
    pub fn leaf(&mut self, tag: u32, version: u32, payload: &[u8]) -> ParseResult<()> {
        self.begin(tag, version)?;
        self.inner.write_all(payload)?;
        self.end()
    }

    /// Number of chunks still open
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Finish writing; every chunk must have been closed
    pub fn finish(mut self) -> ParseResult<W> {
        if let Some(open) = self.stack.last() {
            return Err(ParseError::Invariant(format!(
                "{} chunk(s) still open, innermost tag 0x{:08X}",
                self.stack.len(),
                open.tag
            )));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Seek> Write for ChunkWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn size_field(value: u64, tag: u32) -> ParseResult<u32> {
    u32::try_from(value).map_err(|_| {
        ParseError::structural(0, format!("chunk 0x{tag:08X} size {value} does not fit in 32 bits"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkReader;
    use std::io::Cursor;

    #[test]
    fn test_leaf_chunk_sizes() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.leaf(0x101, 2, &[9; 10]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert_eq!(bytes.len(), 26);
        let header = ChunkHeader::decode(&bytes[..16]).unwrap();
        assert_eq!(header, ChunkHeader { tag: 0x101, version: 2, total_size: 26, payload_size: 10 });
    }

    #[test]
    fn test_parent_inline_size_frozen_at_first_child() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.begin(1, 0).unwrap();
        writer.write_all(&[1, 2, 3, 4]).unwrap();
        writer.leaf(2, 0, &[5; 8]).unwrap();
        writer.leaf(3, 0, &[6; 2]).unwrap();
        writer.end().unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut reader = ChunkReader::new(Cursor::new(bytes)).unwrap();
        let parent = reader.next_chunk().unwrap();
        assert_eq!(parent.header.payload_size, 4);
        assert_eq!(parent.header.total_size, 16 + 4 + 24 + 18);

        reader.skip_to(parent.payload_end()).unwrap();
        let first = reader.next_chunk().unwrap();
        assert_eq!(first.header.tag, 2);
        assert_eq!(first.header.payload_size, 8);
        reader.skip_to(first.end).unwrap();
        let second = reader.next_chunk().unwrap();
        assert_eq!(second.header.tag, 3);
        assert_eq!(second.end, parent.end);
    }

    #[test]
    fn test_stream_position_restored_after_end() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.leaf(1, 0, &[0; 3]).unwrap();
        writer.write_all(&[0xAA]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[19], 0xAA);
    }

    #[test]
    fn test_end_without_begin_is_invariant_error() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        let err = writer.end().unwrap_err();
        assert!(matches!(err, ParseError::Invariant(_)));
    }

    #[test]
    fn test_finish_with_open_chunk_fails() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()));
        writer.begin(1, 0).unwrap();
        assert_eq!(writer.depth(), 1);
        assert!(matches!(writer.finish(), Err(ParseError::Invariant(_))));
    }

    /// Discards bytes and only tracks the position, which tests can move
    /// past 4 GiB without allocating
    struct SparseSink {
        pos: std::rc::Rc<std::cell::Cell<u64>>,
    }

    impl Write for SparseSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.pos.set(self.pos.get() + buf.len() as u64);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for SparseSink {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            let next = match pos {
                SeekFrom::Start(p) => p,
                SeekFrom::Current(d) | SeekFrom::End(d) => self.pos.get().saturating_add_signed(d),
            };
            self.pos.set(next);
            Ok(next)
        }
    }

    #[test]
    fn test_oversized_chunk_is_structural() {
        let pos = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut writer = ChunkWriter::new(SparseSink { pos: pos.clone() });
        writer.begin(0x77, 0).unwrap();
        pos.set(CHUNK_HEADER_SIZE + u64::from(u32::MAX) + 1);

        let err = writer.end().unwrap_err();
        assert!(matches!(err, ParseError::Structural { .. }));
        assert!(err.to_string().contains("0x00000077"));
    }

    #[test]
    fn test_largest_representable_chunk_is_accepted() {
        let pos = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut writer = ChunkWriter::new(SparseSink { pos: pos.clone() });
        writer.begin(0x78, 0).unwrap();
        pos.set(u64::from(u32::MAX));
        writer.end().unwrap();
        assert_eq!(pos.get(), u64::from(u32::MAX));
    }
}
