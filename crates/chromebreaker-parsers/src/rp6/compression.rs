// chromebreaker-parsers/src/rp6/compression.rs
//! Section decompression for RP6 archives
//!
//! Compressed sections are either zlib streams or raw LZMA1 data with the
//! engine's default properties (lc=3, lp=0, pb=2). The codec is sniffed
//! from the first two bytes.

use std::io::{Cursor, Read};

use tracing::warn;

use crate::binary::read_fully;
use crate::traits::{ParseError, ParseResult};

/// LZMA properties byte for lc=3, lp=0, pb=2
const LZMA_DEFAULT_PROPS: u8 = (2 * 5) * 9 + 3;

/// Smallest dictionary liblzma accepts
const LZMA_MIN_DICT: u32 = 4096;

/// Codec used by a compressed section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionCodec {
    Zlib,
    Lzma,
}

impl SectionCodec {
    /// Zlib when the first two bytes form a valid zlib header, LZMA otherwise
    pub fn detect(data: &[u8]) -> Self {
        if is_zlib_header(data) {
            SectionCodec::Zlib
        } else {
            SectionCodec::Lzma
        }
    }
}

impl std::fmt::Display for SectionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionCodec::Zlib => f.write_str("zlib"),
            SectionCodec::Lzma => f.write_str("lzma"),
        }
    }
}

/// Method nibble 8 (DEFLATE) and a big-endian CMF/FLG pair divisible by 31
pub fn is_zlib_header(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => cmf & 0x0F == 8 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

/// Output of one section decompression
#[derive(Debug, Clone)]
pub struct Inflated {
    pub data: Vec<u8>,
    pub codec: SectionCodec,
    /// Size the section header promised
    pub declared_size: usize,
}

impl Inflated {
    /// Whether the decoder stopped before the declared size
    pub fn is_short(&self) -> bool {
        self.data.len() < self.declared_size
    }
}

/// Handles decompression of RP6 sections
pub struct SectionDecompressor;

impl SectionDecompressor {
    /// Inflate `data` up to `declared_size` bytes.
    ///
    /// A short result is logged and returned truncated; consumers that only
    /// need the leading bytes can still use it. Decoder failures are errors.
    pub fn decompress(data: &[u8], declared_size: usize) -> ParseResult<Inflated> {
        let codec = SectionCodec::detect(data);
        let result = match codec {
            SectionCodec::Zlib => read_up_to(flate2::read::ZlibDecoder::new(data), declared_size),
            SectionCodec::Lzma => Self::decompress_lzma(data, declared_size),
        };

        let out = result.map_err(|e| ParseError::DecompressionFailed(format!("{codec}: {e}")))?;

        let inflated = Inflated {
            data: out,
            codec,
            declared_size,
        };
        if inflated.is_short() {
            warn!(
                %codec,
                produced = inflated.data.len(),
                declared = declared_size,
                "Section decompressed short"
            );
        }
        Ok(inflated)
    }

    /// Raw LZMA1 has no header, so an `.lzma` header with the default
    /// properties and an unknown size is synthesized in front of it.
    fn decompress_lzma(data: &[u8], declared_size: usize) -> std::io::Result<Vec<u8>> {
        let dict_size = u32::try_from(declared_size).unwrap_or(u32::MAX).max(LZMA_MIN_DICT);

        let mut header = Vec::with_capacity(13);
        header.push(LZMA_DEFAULT_PROPS);
        header.extend_from_slice(&dict_size.to_le_bytes());
        header.extend_from_slice(&u64::MAX.to_le_bytes());

        let reader = Cursor::new(header).chain(data);
        let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)?;
        read_up_to(xz2::read::XzDecoder::new_stream(reader, stream), declared_size)
    }
}

/// Read until `limit` bytes are produced or the decoder yields nothing more
fn read_up_to<R: Read>(mut decoder: R, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut out = vec![0u8; limit];
    let got = read_fully(&mut decoder, &mut out)?;
    out.truncate(got);
    Ok(out)
}
