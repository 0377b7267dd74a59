//! RIFF reader for WAV and AVI.
//!
//! Chunks are `FourCC id, u32le size, payload`, padded to an even length.
//! `LIST` chunks carry a list type followed by nested chunks.

use super::{depth_exceeded, Parsed, RawFields, ReadContext, SourceCursor};
use crate::cursor::ParseCursor;
use crate::error::{ParseError, Result};
use crate::fourcc::FourCC;
use crate::record::TagSet;
use crate::tags::riff_info;
use std::io::{Read, Seek};
use tracing::{debug, trace, warn};

/// Largest header-style chunk we are willing to buffer.
const MAX_HEADER_CHUNK: u64 = 1 << 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiffRaw {
    /// `WAVE` or `AVI `.
    pub form: Option<FourCC>,
    pub wave: Option<WaveFormat>,
    pub data_size: Option<u64>,
    pub avi_header: Option<AviMainHeader>,
    pub streams: Vec<AviStream>,
    pub tags: TagSet,
}

/// WAVEFORMATEX, shared by WAV `fmt ` and AVI audio `strf`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// For `WAVE_FORMAT_EXTENSIBLE`, the tag carried in the sub-format GUID.
    pub sub_format: Option<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AviMainHeader {
    pub us_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub total_frames: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfo {
    pub width: u32,
    pub height: u32,
    pub bit_count: u16,
    pub compression: FourCC,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AviStream {
    /// `vids`, `auds`, `txts`, ...
    pub stream_type: FourCC,
    pub handler: FourCC,
    pub scale: u32,
    pub rate: u32,
    pub length: u32,
    pub video: Option<BitmapInfo>,
    pub audio: Option<WaveFormat>,
}

#[derive(Debug, Clone, Copy)]
struct ChunkHeader {
    id: FourCC,
    start: u64,
    size: u64,
}

impl ChunkHeader {
    fn data_start(&self) -> u64 {
        self.start + 8
    }

    fn data_end(&self) -> u64 {
        self.data_start() + self.size
    }
}

pub fn read(c: &mut SourceCursor<'_>, ctx: &ReadContext) -> Parsed<RawFields> {
    let mut raw = RiffRaw::default();
    let mut warnings = Vec::new();
    let error = walk_riff(c, ctx, &mut raw, &mut warnings).err();
    Parsed {
        raw: RawFields::Riff(raw),
        warnings,
        error,
    }
}

fn walk_riff<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    ctx: &ReadContext,
    raw: &mut RiffRaw,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let magic: [u8; 4] = c.read_array()?;
    if &magic != b"RIFF" {
        return Err(ParseError::malformed(0, "missing RIFF signature"));
    }
    let declared = c.read_u32_le()? as u64;
    let form = FourCC(c.read_array()?);
    raw.form = Some(form);
    debug!(%form, declared, "RIFF header");

    // A file cut short still yields the chunks before the cut; the
    // truncation is reported once the walk stops.
    let mut cut_short = None;
    let riff_end = if declared == 0 || declared == u32::MAX as u64 {
        warnings.push("RIFF size field is unset; reading to end of file".to_string());
        c.stream_len()
    } else {
        let end = 8 + declared;
        match c.ensure_within(end) {
            Ok(()) => end,
            Err(e) if e.is_truncation() => {
                warn!(declared, len = c.stream_len(), "RIFF shorter than declared");
                cut_short = Some(e);
                c.stream_len()
            }
            Err(e) => return Err(e),
        }
    };

    while c.position() + 8 <= riff_end {
        let hdr = read_chunk_id(c)?;
        if let Err(e) = check_chunk_fits(c, &hdr, riff_end) {
            if !e.is_truncation() {
                return Err(e);
            }
            if &hdr.id.0 == b"data" {
                raw.data_size = Some(hdr.size);
            }
            cut_short.get_or_insert(e);
            break;
        }
        trace!(id = %hdr.id, size = hdr.size, offset = hdr.start, "chunk");
        match &hdr.id.0 {
            b"fmt " => raw.wave = Some(parse_wave_format(&read_payload(c, &hdr)?)?),
            b"data" => raw.data_size = Some(hdr.size),
            b"LIST" => {
                let list_type = read_list_type(c, &hdr)?;
                match &list_type.0 {
                    b"hdrl" => {
                        let (avih, streams) = parse_hdrl(c, &hdr, 1, ctx)?;
                        raw.avi_header = avih.or(raw.avi_header);
                        raw.streams.extend(streams);
                    }
                    b"INFO" => raw.tags.merge_missing(&parse_info(c, &hdr)?),
                    _ => debug!(%list_type, "skipping list"),
                }
            }
            _ => {}
        }
        skip_chunk(c, &hdr, riff_end)?;
    }
    if let Some(e) = cut_short {
        return Err(e);
    }

    if raw.form.map(|f| f.0) == Some(*b"WAVE") {
        if raw.wave.is_none() {
            return Err(ParseError::malformed(12, "WAVE file without a fmt chunk"));
        }
        if raw.data_size.is_none() {
            return Err(ParseError::malformed(12, "WAVE file without a data chunk"));
        }
    }
    Ok(())
}

/// Reads a chunk header and checks that the payload fits within `parent_end`.
fn read_chunk_header<R: Read + Seek>(c: &mut ParseCursor<R>, parent_end: u64) -> Result<ChunkHeader> {
    let hdr = read_chunk_id(c)?;
    check_chunk_fits(c, &hdr, parent_end)?;
    Ok(hdr)
}

fn read_chunk_id<R: Read + Seek>(c: &mut ParseCursor<R>) -> Result<ChunkHeader> {
    let start = c.position();
    let id = FourCC(c.read_array()?);
    let size = c.read_u32_le()? as u64;
    Ok(ChunkHeader { id, start, size })
}

fn check_chunk_fits<R: Read + Seek>(c: &ParseCursor<R>, hdr: &ChunkHeader, parent_end: u64) -> Result<()> {
    if hdr.data_end() <= parent_end {
        return Ok(());
    }
    if hdr.data_end() > c.stream_len() {
        return Err(ParseError::truncated(
            hdr.data_start(),
            hdr.size,
            c.stream_len().saturating_sub(hdr.data_start()),
        ));
    }
    Err(ParseError::malformed(
        hdr.start,
        format!("chunk '{}' of {} bytes overruns its parent", hdr.id, hdr.size),
    ))
}

/// Moves past a chunk and its pad byte.
///
/// Writers are supposed to pad odd-sized chunks, but some do not. The pad is
/// taken as absent when the byte where it should be starts a plausible
/// chunk id and the byte after it does not.
fn skip_chunk<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &ChunkHeader, parent_end: u64) -> Result<()> {
    let end = hdr.data_end();
    c.seek_to(end)?;
    if hdr.size % 2 == 0 || end >= parent_end {
        return Ok(());
    }
    let probe = c.peek_bytes(5)?;
    let looks_like_id = |b: &[u8]| b.len() >= 4 && FourCC::from_slice(b).is_some_and(|f| f.is_printable());
    let pad_missing = probe.first() != Some(&0) && looks_like_id(&probe) && !looks_like_id(&probe[1..]);
    if pad_missing {
        debug!(id = %hdr.id, offset = end, "odd chunk without pad byte");
        Ok(())
    } else {
        c.seek_to(end + 1)
    }
}

fn read_list_type<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &ChunkHeader) -> Result<FourCC> {
    if hdr.size < 4 {
        return Err(ParseError::malformed(hdr.start, "LIST chunk too small for a list type"));
    }
    Ok(FourCC(c.read_array()?))
}

fn read_payload<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &ChunkHeader) -> Result<Vec<u8>> {
    if hdr.size > MAX_HEADER_CHUNK {
        return Err(ParseError::malformed(
            hdr.start,
            format!("'{}' chunk of {} bytes is implausibly large", hdr.id, hdr.size),
        ));
    }
    c.seek_to(hdr.data_start())?;
    c.read_bytes(hdr.size)
}

pub fn parse_wave_format(data: &[u8]) -> Result<WaveFormat> {
    let mut r = ParseCursor::from_slice(data);
    let mut fmt = WaveFormat {
        format_tag: r.read_u16_le()?,
        channels: r.read_u16_le()?,
        sample_rate: r.read_u32_le()?,
        byte_rate: r.read_u32_le()?,
        block_align: r.read_u16_le()?,
        bits_per_sample: 0,
        sub_format: None,
    };
    // some ADPCM writers stop after block_align
    if r.remaining() >= 2 {
        fmt.bits_per_sample = r.read_u16_le()?;
    }
    if fmt.format_tag == crate::codecs::WAVE_FORMAT_EXTENSIBLE && r.remaining() >= 10 {
        let _cb_size = r.read_u16_le()?;
        let _valid_bits = r.read_u16_le()?;
        let _channel_mask = r.read_u32_le()?;
        fmt.sub_format = Some(r.read_u16_le()?);
    }
    Ok(fmt)
}

fn parse_avih(data: &[u8]) -> Result<AviMainHeader> {
    let mut r = ParseCursor::from_slice(data);
    let us_per_frame = r.read_u32_le()?;
    let max_bytes_per_sec = r.read_u32_le()?;
    r.skip(8)?;
    let total_frames = r.read_u32_le()?;
    r.skip(12)?;
    Ok(AviMainHeader {
        us_per_frame,
        max_bytes_per_sec,
        total_frames,
        width: r.read_u32_le()?,
        height: r.read_u32_le()?,
    })
}

fn parse_bitmap_info(data: &[u8]) -> Result<BitmapInfo> {
    let mut r = ParseCursor::from_slice(data);
    r.skip(4)?;
    let width = r.read_u32_le()? as i32;
    let height = r.read_u32_le()? as i32;
    r.skip(2)?;
    let bit_count = r.read_u16_le()?;
    let compression = FourCC(r.read_array()?);
    Ok(BitmapInfo {
        width: width.unsigned_abs(),
        // negative height marks a top-down bitmap
        height: height.unsigned_abs(),
        bit_count,
        compression,
    })
}

fn parse_hdrl<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    list: &ChunkHeader,
    depth: u32,
    ctx: &ReadContext,
) -> Result<(Option<AviMainHeader>, Vec<AviStream>)> {
    if depth > ctx.max_depth {
        return Err(depth_exceeded(list.start, ctx.max_depth));
    }
    let mut avih = None;
    let mut streams = Vec::new();
    let end = list.data_end();
    while c.position() + 8 <= end {
        let hdr = read_chunk_header(c, end)?;
        match &hdr.id.0 {
            b"avih" => avih = Some(parse_avih(&read_payload(c, &hdr)?)?),
            b"LIST" => {
                let list_type = read_list_type(c, &hdr)?;
                if &list_type.0 == b"strl" {
                    if let Some(s) = parse_strl(c, &hdr, depth + 1, ctx)? {
                        streams.push(s);
                    }
                }
            }
            _ => {}
        }
        skip_chunk(c, &hdr, end)?;
    }
    Ok((avih, streams))
}

fn parse_strl<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    list: &ChunkHeader,
    depth: u32,
    ctx: &ReadContext,
) -> Result<Option<AviStream>> {
    if depth > ctx.max_depth {
        return Err(depth_exceeded(list.start, ctx.max_depth));
    }
    let mut stream: Option<AviStream> = None;
    let end = list.data_end();
    while c.position() + 8 <= end {
        let hdr = read_chunk_header(c, end)?;
        match &hdr.id.0 {
            b"strh" => {
                let data = read_payload(c, &hdr)?;
                let mut r = ParseCursor::from_slice(&data);
                let stream_type = FourCC(r.read_array()?);
                let handler = FourCC(r.read_array()?);
                r.skip(12)?;
                let scale = r.read_u32_le()?;
                let rate = r.read_u32_le()?;
                r.skip(4)?;
                let length = r.read_u32_le()?;
                stream = Some(AviStream {
                    stream_type,
                    handler,
                    scale,
                    rate,
                    length,
                    video: None,
                    audio: None,
                });
            }
            b"strf" => {
                let data = read_payload(c, &hdr)?;
                match stream.as_mut() {
                    Some(s) if &s.stream_type.0 == b"vids" => s.video = Some(parse_bitmap_info(&data)?),
                    Some(s) if &s.stream_type.0 == b"auds" => s.audio = Some(parse_wave_format(&data)?),
                    Some(_) => {}
                    None => warn!(offset = hdr.start, "strf before strh"),
                }
            }
            _ => {}
        }
        skip_chunk(c, &hdr, end)?;
    }
    Ok(stream)
}

fn parse_info<R: Read + Seek>(c: &mut ParseCursor<R>, list: &ChunkHeader) -> Result<TagSet> {
    let mut tags = TagSet::new();
    let end = list.data_end();
    while c.position() + 8 <= end {
        let hdr = read_chunk_header(c, end)?;
        let payload = read_payload(c, &hdr)?;
        riff_info::apply(&hdr.id.0, &payload, &mut tags);
        skip_chunk(c, &hdr, end)?;
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_format_extensible() {
        let mut d = Vec::new();
        d.extend_from_slice(&0xFFFEu16.to_le_bytes());
        d.extend_from_slice(&2u16.to_le_bytes());
        d.extend_from_slice(&48000u32.to_le_bytes());
        d.extend_from_slice(&(48000u32 * 6).to_le_bytes());
        d.extend_from_slice(&6u16.to_le_bytes());
        d.extend_from_slice(&24u16.to_le_bytes());
        d.extend_from_slice(&22u16.to_le_bytes());
        d.extend_from_slice(&24u16.to_le_bytes());
        d.extend_from_slice(&3u32.to_le_bytes());
        d.extend_from_slice(&1u16.to_le_bytes());
        d.extend_from_slice(&[0u8; 14]);
        let f = parse_wave_format(&d).unwrap();
        assert_eq!(f.channels, 2);
        assert_eq!(f.bits_per_sample, 24);
        assert_eq!(f.sub_format, Some(1));
    }

    #[test]
    fn short_fmt_is_an_error() {
        assert!(parse_wave_format(&[1, 0, 1, 0]).is_err());
    }
}
