//! Native FLAC metadata blocks.

use super::{Parsed, RawFields, ReadContext, SourceCursor};
use crate::cursor::ParseCursor;
use crate::error::{ParseError, Result};
use crate::record::TagSet;
use crate::tags::{id3v2, vorbis};
use std::io::{Read, Seek};
use tracing::{debug, trace};

const BLOCK_STREAMINFO: u8 = 0;
const BLOCK_VORBIS_COMMENT: u8 = 4;
const BLOCK_INVALID: u8 = 127;
const STREAMINFO_LEN: u64 = 34;
/// Comment blocks larger than this are skipped.
const MAX_COMMENT_BLOCK: u64 = 16 << 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    /// 0 when the encoder did not know the length.
    pub total_samples: u64,
}

impl StreamInfo {
    /// Unpacks the 34-byte STREAMINFO body. Sample rate, channels, depth and
    /// sample count share one 64-bit big-endian field at offset 10:
    /// 20 bits rate, 3 bits channels-1, 5 bits depth-1, 36 bits samples.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = ParseCursor::from_slice(data);
        let min_block_size = r.read_u16_be()?;
        let max_block_size = r.read_u16_be()?;
        let _min_frame = r.read_u24_be()?;
        let _max_frame = r.read_u24_be()?;
        let packed = r.read_u64_be()?;
        Ok(StreamInfo {
            min_block_size,
            max_block_size,
            sample_rate: (packed >> 44) as u32,
            channels: ((packed >> 41) & 0x7) as u8 + 1,
            bits_per_sample: ((packed >> 36) & 0x1F) as u8 + 1,
            total_samples: packed & 0xF_FFFF_FFFF,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlacRaw {
    pub stream_info: Option<StreamInfo>,
    pub vendor: Option<String>,
    pub tags: TagSet,
    /// Tags from an ID3v2 header in front of the `fLaC` marker.
    pub id3_tags: TagSet,
}

pub fn read(c: &mut SourceCursor<'_>, _ctx: &ReadContext) -> Parsed<RawFields> {
    let mut raw = FlacRaw::default();
    let mut warnings = Vec::new();
    let error = walk(c, &mut raw, &mut warnings).err();
    Parsed {
        raw: RawFields::Flac(raw),
        warnings,
        error,
    }
}

fn walk<R: Read + Seek>(c: &mut ParseCursor<R>, raw: &mut FlacRaw, warnings: &mut Vec<String>) -> Result<()> {
    if let Some(tag) = id3v2::read_tag(c)? {
        warnings.push("ID3v2 tag in front of FLAC stream".to_string());
        warnings.extend(tag.warnings);
        raw.id3_tags = tag.tags;
    }
    let marker_at = c.position();
    let marker: [u8; 4] = c.read_array()?;
    if &marker != b"fLaC" {
        return Err(ParseError::malformed(marker_at, "missing fLaC marker"));
    }

    let mut blocks = 0u32;
    loop {
        let header_at = c.position();
        let header = c.read_u8()?;
        let is_last = header & 0x80 != 0;
        let block_type = header & 0x7F;
        let len = c.read_u24_be()? as u64;
        c.ensure_within(c.position() + len)?;
        trace!(block_type, len, offset = header_at, "metadata block");

        if blocks == 0 && block_type != BLOCK_STREAMINFO {
            return Err(ParseError::malformed(header_at, "first metadata block is not STREAMINFO"));
        }
        blocks += 1;
        match block_type {
            BLOCK_STREAMINFO => {
                if len < STREAMINFO_LEN {
                    return Err(ParseError::malformed(header_at, format!("STREAMINFO of {len} bytes")));
                }
                let info = StreamInfo::parse(&c.read_bytes(STREAMINFO_LEN)?)?;
                debug!(?info, "STREAMINFO");
                raw.stream_info = Some(info);
            }
            BLOCK_VORBIS_COMMENT if len <= MAX_COMMENT_BLOCK => {
                let vc = vorbis::decode(&c.read_bytes(len)?)?;
                raw.vendor = Some(vc.vendor);
                raw.tags = vc.tags;
            }
            BLOCK_VORBIS_COMMENT => warnings.push(format!("VORBIS_COMMENT block of {len} bytes skipped")),
            BLOCK_INVALID => return Err(ParseError::malformed(header_at, "invalid metadata block type 127")),
            _ => {}
        }
        c.seek_to(header_at + 4 + len)?;
        if is_last {
            break;
        }
    }

    debug!(blocks, audio_offset = c.position(), "metadata done");
    check_first_frame(c, raw, warnings)
}

/// Metadata says nothing about the audio that follows; the best available
/// check is that a frame sync code starts right after the last block.
fn check_first_frame<R: Read + Seek>(c: &mut ParseCursor<R>, raw: &FlacRaw, warnings: &mut Vec<String>) -> Result<()> {
    let expects_audio = raw.stream_info.is_some_and(|i| i.total_samples > 0);
    if c.remaining() == 0 {
        if expects_audio {
            return Err(ParseError::truncated(c.position(), 2, 0));
        }
        return Ok(());
    }
    let audio_offset = c.position();
    let sync: [u8; 2] = c.read_array()?;
    if sync[0] != 0xFF || sync[1] & 0xFE != 0xF8 {
        warnings.push(format!("no frame sync after metadata at offset {audio_offset}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaminfo_bit_packing() {
        // 44100 Hz, 2 channels, 16 bits, 441000 samples
        let packed: u64 = (44100u64 << 44) | (1 << 41) | (15 << 36) | 441_000;
        let mut d = Vec::new();
        d.extend_from_slice(&4096u16.to_be_bytes());
        d.extend_from_slice(&4096u16.to_be_bytes());
        d.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        d.extend_from_slice(&packed.to_be_bytes());
        d.extend_from_slice(&[0u8; 16]);
        let info = StreamInfo::parse(&d).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.total_samples, 441_000);
    }

    #[test]
    fn sample_count_above_32_bits() {
        let packed: u64 = (96000u64 << 44) | (7 << 41) | (23 << 36) | 0x9_0000_0001;
        let mut d = vec![0u8; 10];
        d.extend_from_slice(&packed.to_be_bytes());
        let info = StreamInfo::parse(&d).unwrap();
        assert_eq!(info.channels, 8);
        assert_eq!(info.bits_per_sample, 24);
        assert_eq!(info.total_samples, 0x9_0000_0001);
    }
}
