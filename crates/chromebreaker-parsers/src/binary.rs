//! Fixed-size record codec shared by every format in this crate.
//!
//! Records are decoded from exactly `SIZE` bytes through `byteorder`,
//! never by reinterpreting memory. Readers fail with a structural error
//! when the stream ends before a full record is available.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::traits::{ParseError, ParseResult};

/// A little-endian record with a fixed wire width
pub trait Record: Sized {
    /// Encoded width in bytes
    const SIZE: usize;

    /// Decode from a slice of exactly `SIZE` bytes
    fn decode(buf: &[u8]) -> io::Result<Self>;

    /// Append the encoded form to `out`
    fn encode<W: Write>(&self, out: &mut W) -> io::Result<()>;
}

/// Read up to `buf.len()` bytes, returning how many were actually read
pub fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read exactly `len` bytes or fail with a structural error
pub fn read_bytes<R: Read + ?Sized>(reader: &mut R, len: usize, what: &str) -> ParseResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let got = read_fully(reader, &mut buf)?;
    if got != len {
        return Err(ParseError::structural(
            got as u64,
            format!("short read of {what}: expected {len} bytes, got {got}"),
        ));
    }
    Ok(buf)
}

/// Read one record from a stream
pub fn read_record<T: Record, R: Read + ?Sized>(reader: &mut R) -> ParseResult<T> {
    let buf = read_bytes(reader, T::SIZE, std::any::type_name::<T>())?;
    Ok(T::decode(&buf)?)
}

/// Read `count` consecutive records
pub fn read_records<T: Record, R: Read + ?Sized>(reader: &mut R, count: usize) -> ParseResult<Vec<T>> {
    (0..count).map(|_| read_record(reader)).collect()
}

/// Decode the record at `offset` inside an in-memory image
pub fn record_at<T: Record>(image: &[u8], offset: usize) -> ParseResult<T> {
    let bytes = slice_at(image, offset, T::SIZE)?;
    Ok(T::decode(bytes)?)
}

/// Decode `count` consecutive records starting at `offset`
pub fn records_at<T: Record>(image: &[u8], offset: usize, count: usize) -> ParseResult<Vec<T>> {
    let total = count.checked_mul(T::SIZE).ok_or(ParseError::OutOfBounds {
        offset: offset as u64,
        len: u64::MAX,
        limit: image.len() as u64,
    })?;
    let bytes = slice_at(image, offset, total)?;
    bytes
        .chunks_exact(T::SIZE)
        .map(|chunk| T::decode(chunk).map_err(ParseError::from))
        .collect()
}

/// Bounds-checked sub-slice
pub fn slice_at(image: &[u8], offset: usize, len: usize) -> ParseResult<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| image.get(offset..end))
        .ok_or(ParseError::OutOfBounds {
            offset: offset as u64,
            len: len as u64,
            limit: image.len() as u64,
        })
}

/// Null-terminated string starting at `offset`; runs to the end of the
/// buffer when no terminator is present. Offsets past the end yield "".
pub fn cstring_at(buf: &[u8], offset: usize) -> String {
    let Some(tail) = buf.get(offset..) else {
        return String::new();
    };
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..end]).into_owned()
}

/// Read a null-terminated string from a stream; EOF also terminates
pub fn read_cstring<R: Read + ?Sized>(reader: &mut R) -> ParseResult<String> {
    let mut bytes = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        if read_fully(reader, &mut byte)? == 0 || byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a fixed-width, null-padded name field
pub fn fixed_name(field: &[u8]) -> String {
    cstring_at(field, 0)
}

/// Encode `name` into a null-padded field of `width` bytes, truncating
pub fn write_fixed_name<W: Write>(out: &mut W, name: &str, width: usize) -> io::Result<()> {
    let mut field = vec![0u8; width];
    let bytes = name.as_bytes();
    let len = bytes.len().min(width);
    field[..len].copy_from_slice(&bytes[..len]);
    out.write_all(&field)
}

/// Read `N` little-endian floats
pub fn read_f32s<const N: usize, R: Read>(reader: &mut R) -> io::Result<[f32; N]> {
    let mut values = [0f32; N];
    reader.read_f32_into::<LittleEndian>(&mut values)?;
    Ok(values)
}

/// Write little-endian floats
pub fn write_f32s<W: Write>(out: &mut W, values: &[f32]) -> io::Result<()> {
    values.iter().try_for_each(|&v| out.write_f32::<LittleEndian>(v))
}

/// Flatten per-vertex float tuples into little-endian bytes
pub fn pack_f32<const N: usize>(items: &[[f32; N]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(items.len() * N * 4);
    for item in items {
        for value in item {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}
