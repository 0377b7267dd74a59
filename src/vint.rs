//! Variable-length integers: EBML vints and the ISO-BMFF extended box size.

use crate::cursor::ParseCursor;
use crate::error::{ParseError, Result};
use std::io::{Read, Seek};

/// Returned by [`read_element_size`] when every value bit is set.
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Length in bytes signalled by the leading byte of a vint (1..=8), or
/// `None` when the byte is zero.
pub fn vint_length(first: u8) -> Option<u8> {
    if first == 0 {
        None
    } else {
        Some(first.leading_zeros() as u8 + 1)
    }
}

/// Decodes an element ID from the front of `data`, keeping the marker bits.
///
/// Returns the ID and the number of bytes consumed.
pub fn decode_element_id(data: &[u8]) -> Option<(u32, usize)> {
    let len = vint_length(*data.first()?)? as usize;
    if len > 4 || data.len() < len {
        return None;
    }
    let id = data[..len]
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32);
    Some((id, len))
}

/// Decodes a size vint from the front of `data` with the marker stripped.
pub fn decode_element_size(data: &[u8]) -> Option<(u64, usize)> {
    let first = *data.first()?;
    let len = vint_length(first)? as usize;
    if data.len() < len {
        return None;
    }
    let mask = if len == 8 { 0 } else { 0xFFu8 >> len };
    let mut value = (first & mask) as u64;
    let mut all_ones = (first & mask) == mask;
    for &b in &data[1..len] {
        value = (value << 8) | b as u64;
        all_ones &= b == 0xFF;
    }
    if all_ones {
        return Some((UNKNOWN_SIZE, len));
    }
    Some((value, len))
}

pub fn read_element_id<R: Read + Seek>(c: &mut ParseCursor<R>) -> Result<u32> {
    let start = c.position();
    let first = c.read_u8()?;
    let len = match vint_length(first) {
        Some(l) if l <= 4 => l,
        _ => {
            return Err(ParseError::malformed(
                start,
                format!("invalid element id lead byte 0x{first:02X}"),
            ));
        }
    };
    let mut id = first as u32;
    for _ in 1..len {
        id = (id << 8) | c.read_u8()? as u32;
    }
    Ok(id)
}

pub fn read_element_size<R: Read + Seek>(c: &mut ParseCursor<R>) -> Result<u64> {
    let start = c.position();
    let first = c.read_u8()?;
    let Some(len) = vint_length(first) else {
        return Err(ParseError::malformed(start, "invalid element size lead byte 0x00"));
    };
    let mut buf = vec![first];
    buf.extend(c.read_bytes(len as u64 - 1)?);
    decode_element_size(&buf)
        .map(|(v, _)| v)
        .ok_or_else(|| ParseError::malformed(start, "invalid element size"))
}

/// Declared size of an ISO-BMFF box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxSize {
    /// Total size including the header.
    Sized(u64),
    /// Size field was 0: the box runs to the end of its parent.
    ToEnd,
}

/// Resolves the 32-bit size field of a box header. The cursor must sit just
/// after the type field; a 64-bit size is read from there when `size32 == 1`.
///
/// Returns the size and the number of header bytes the size occupied.
pub fn read_extended_size<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    size32: u32,
) -> Result<(BoxSize, u64)> {
    match size32 {
        0 => Ok((BoxSize::ToEnd, 4)),
        1 => Ok((BoxSize::Sized(c.read_u64_be()?), 12)),
        n => Ok((BoxSize::Sized(n as u64), 4)),
    }
}
