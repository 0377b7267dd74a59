//! Bounded reader shared by every container reader.
//!
//! A [`ParseCursor`] tracks its own position and a declared end offset. Reads
//! that would cross the declared end fail instead of returning short data:
//! crossing the physical end of the stream is reported as
//! [`ParseError::Truncated`], crossing a nested boundary set by
//! [`ParseCursor::with_limit`] is reported as [`ParseError::Malformed`].

use crate::error::{ParseError, Result};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

pub struct ParseCursor<R> {
    inner: R,
    pos: u64,
    end: u64,
    len: u64,
}

impl<'a> ParseCursor<Cursor<&'a [u8]>> {
    /// Cursor over an in-memory buffer, used by the tag decoders.
    pub fn from_slice(data: &'a [u8]) -> Self {
        let len = data.len() as u64;
        ParseCursor {
            inner: Cursor::new(data),
            pos: 0,
            end: len,
            len,
        }
    }
}

impl<R: Read + Seek> ParseCursor<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(ParseCursor {
            inner,
            pos: 0,
            end: len,
            len,
        })
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Current declared end offset.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Physical length of the underlying stream.
    pub fn stream_len(&self) -> u64 {
        self.len
    }

    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.end
    }

    /// Fails unless the absolute range `[pos, region_end)` fits inside the
    /// current limit.
    pub fn ensure_within(&self, region_end: u64) -> Result<()> {
        if region_end <= self.end {
            return Ok(());
        }
        let needed = region_end.saturating_sub(self.pos);
        if region_end > self.len {
            Err(ParseError::truncated(
                self.pos,
                needed,
                self.len.saturating_sub(self.pos),
            ))
        } else {
            Err(ParseError::malformed(
                self.pos,
                format!(
                    "region of {needed} bytes crosses enclosing boundary at {}",
                    self.end
                ),
            ))
        }
    }

    fn check(&self, n: u64) -> Result<()> {
        self.ensure_within(self.pos.saturating_add(n))
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset > self.end {
            return Err(if offset > self.len {
                ParseError::truncated(self.pos, offset.saturating_sub(self.pos), self.remaining())
            } else {
                ParseError::malformed(offset, "seek past enclosing boundary")
            });
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.check(n)?;
        self.seek_to(self.pos + n)
    }

    /// Runs `f` with the declared end temporarily narrowed to `pos + len`.
    ///
    /// The previous end is restored afterwards whether or not `f` succeeded.
    /// The position is left wherever `f` left it.
    pub fn with_limit<T>(
        &mut self,
        len: u64,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.check(len)?;
        let saved = self.end;
        self.end = self.pos + len;
        let out = f(self);
        self.end = saved;
        out
    }

    pub fn read_bytes(&mut self, n: u64) -> Result<Vec<u8>> {
        self.check(n)?;
        let mut buf = vec![0u8; n as usize];
        self.inner.read_exact(&mut buf)?;
        self.pos += n;
        Ok(buf)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.check(N as u64)?;
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        self.pos += N as u64;
        Ok(buf)
    }

    /// Reads up to `n` bytes without advancing. Never fails on short data.
    pub fn peek_bytes(&mut self, n: u64) -> Result<Vec<u8>> {
        let take = n.min(self.remaining());
        let start = self.pos;
        let buf = self.read_bytes(take)?;
        self.seek_to(start)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let v = self.inner.read_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.check(2)?;
        let v = self.inner.read_u16::<BigEndian>()?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.check(2)?;
        let v = self.inner.read_u16::<LittleEndian>()?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u24_be(&mut self) -> Result<u32> {
        self.check(3)?;
        let v = self.inner.read_u24::<BigEndian>()?;
        self.pos += 3;
        Ok(v)
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.check(4)?;
        let v = self.inner.read_u32::<BigEndian>()?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.check(4)?;
        let v = self.inner.read_u32::<LittleEndian>()?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.check(8)?;
        let v = self.inner.read_u64::<BigEndian>()?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.check(8)?;
        let v = self.inner.read_u64::<LittleEndian>()?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_f64_be(&mut self) -> Result<f64> {
        self.check(8)?;
        let v = self.inner.read_f64::<BigEndian>()?;
        self.pos += 8;
        Ok(v)
    }

    /// Big-endian unsigned integer of 0 to 8 bytes, as EBML stores them.
    pub fn read_uint_be(&mut self, n: u64) -> Result<u64> {
        if n > 8 {
            return Err(ParseError::malformed(
                self.pos,
                format!("integer of {n} bytes does not fit in 64 bits"),
            ));
        }
        let bytes = self.read_bytes(n)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    /// Big-endian IEEE float stored in 4 or 8 bytes.
    pub fn read_float_be(&mut self, n: u64) -> Result<f64> {
        match n {
            0 => Ok(0.0),
            4 => {
                self.check(4)?;
                let v = self.inner.read_f32::<BigEndian>()?;
                self.pos += 4;
                Ok(v as f64)
            }
            8 => self.read_f64_be(),
            _ => Err(ParseError::malformed(
                self.pos,
                format!("float of {n} bytes"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_position() {
        let data = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut c = ParseCursor::from_slice(&data);
        assert_eq!(c.read_u16_be().unwrap(), 0x0001);
        assert_eq!(c.read_u16_le().unwrap(), 0x0302);
        assert_eq!(c.read_u24_be().unwrap(), 0x040506);
        assert!(c.is_at_end());
    }

    #[test]
    fn read_past_stream_end_is_truncation() {
        let data = [1, 2, 3];
        let mut c = ParseCursor::from_slice(&data);
        let err = c.read_u32_be().unwrap_err();
        assert!(err.is_truncation(), "{err}");
        // failed read must not move the cursor
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn read_past_limit_is_malformed() {
        let data = [0u8; 16];
        let mut c = ParseCursor::from_slice(&data);
        let err = c
            .with_limit(2, |c| c.read_u32_be())
            .unwrap_err();
        assert!(matches!(err, ParseError::Malformed { .. }), "{err}");
        // limit restored
        assert_eq!(c.end(), 16);
    }

    #[test]
    fn limit_larger_than_stream_is_truncation() {
        let data = [0u8; 4];
        let mut c = ParseCursor::from_slice(&data);
        let err = c.with_limit(10, |_| Ok(())).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn peek_does_not_advance() {
        let data = [9, 8, 7];
        let mut c = ParseCursor::from_slice(&data);
        assert_eq!(c.peek_bytes(8).unwrap(), vec![9, 8, 7]);
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn variable_width_uint() {
        let data = [0x0F, 0x42, 0x40];
        let mut c = ParseCursor::from_slice(&data);
        assert_eq!(c.read_uint_be(3).unwrap(), 1_000_000);
    }
}
