// chromebreaker-parsers/src/source.rs
//! File input for parsers: memory-mapped above a size threshold,
//! buffered otherwise.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::traits::{ParseOptions, ParseResult};

/// An opened input file
#[derive(Debug)]
pub enum FileSource {
    Mapped(Cursor<Mmap>),
    Buffered(BufReader<File>),
}

impl FileSource {
    /// Open `path`, mapping it when `options` allow and it is large enough
    pub fn open(path: &Path, options: &ParseOptions) -> ParseResult<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        if options.use_memory_mapping && len >= options.memory_mapping_threshold {
            // SAFETY: the map is read-only; callers must not truncate the
            // file while the source is alive.
            #[allow(unsafe_code)]
            let map = unsafe { Mmap::map(&file)? };
            debug!(path = %path.display(), len, "Memory-mapped input");
            return Ok(FileSource::Mapped(Cursor::new(map)));
        }

        Ok(FileSource::Buffered(BufReader::new(file)))
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, FileSource::Mapped(_))
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileSource::Mapped(c) => c.read(buf),
            FileSource::Buffered(r) => r.read(buf),
        }
    }
}

impl Seek for FileSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            FileSource::Mapped(c) => c.seek(pos),
            FileSource::Buffered(r) => r.seek(pos),
        }
    }
}
