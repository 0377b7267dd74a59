//! MPEG audio (MP1/MP2/MP3) and ADTS AAC streams with ID3 tags.
//!
//! Three passes over the file: an ID3v2 tag at the front, an ID3v1 trailer
//! at the back, and a frame walk over what lies between.

use super::{Parsed, RawFields, ReadContext, SourceCursor};
use crate::cursor::ParseCursor;
use crate::detect::MediaFormat;
use crate::error::{ParseError, Result};
use crate::record::TagSet;
use crate::tags::{id3v1, id3v2};
use std::io::{Read, Seek};
use tracing::{debug, trace};

/// How far past the ID3 tag to look for the first frame.
const SYNC_SEARCH_LEN: u64 = 64 * 1024;

/// Bitrates in kbps indexed by `[table][bitrate_index]`.
static BITRATES: [[u32; 16]; 5] = [
    // MPEG-1 Layer I
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
    // MPEG-1 Layer II
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
    // MPEG-1 Layer III
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
    // MPEG-2/2.5 Layer I
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
    // MPEG-2/2.5 Layer II and III
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
];

static SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000], // MPEG-1
    [22050, 24000, 16000], // MPEG-2
    [11025, 12000, 8000],  // MPEG-2.5
];

static ADTS_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: u8,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    /// 3 is single channel.
    pub channel_mode: u8,
}

impl FrameHeader {
    pub fn parse(b: [u8; 4]) -> Option<Self> {
        if b[0] != 0xFF || b[1] & 0xE0 != 0xE0 {
            return None;
        }
        let version = match (b[1] >> 3) & 0x3 {
            0 => MpegVersion::V25,
            2 => MpegVersion::V2,
            3 => MpegVersion::V1,
            _ => return None,
        };
        let layer = match (b[1] >> 1) & 0x3 {
            1 => 3,
            2 => 2,
            3 => 1,
            _ => return None,
        };
        let table = match (version, layer) {
            (MpegVersion::V1, l) => l as usize - 1,
            (_, 1) => 3,
            _ => 4,
        };
        let bitrate_kbps = BITRATES[table][(b[2] >> 4) as usize];
        let rate_index = ((b[2] >> 2) & 0x3) as usize;
        if bitrate_kbps == 0 || rate_index == 3 {
            return None;
        }
        let sample_rate = SAMPLE_RATES[match version {
            MpegVersion::V1 => 0,
            MpegVersion::V2 => 1,
            MpegVersion::V25 => 2,
        }][rate_index];
        Some(FrameHeader {
            version,
            layer,
            bitrate_kbps,
            sample_rate,
            padding: (b[2] >> 1) & 0x1 == 1,
            channel_mode: b[3] >> 6,
        })
    }

    /// Frame length in bytes, header included.
    pub fn frame_len(&self) -> u64 {
        let br = self.bitrate_kbps as u64 * 1000;
        let sr = self.sample_rate as u64;
        let pad = self.padding as u64;
        match (self.layer, self.version) {
            (1, _) => (12 * br / sr + pad) * 4,
            (3, MpegVersion::V2 | MpegVersion::V25) => 72 * br / sr + pad,
            _ => 144 * br / sr + pad,
        }
    }

    pub fn channels(&self) -> u16 {
        if self.channel_mode == 3 { 1 } else { 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// Audio object type minus one: 0 Main, 1 LC, 2 SSR, 3 LTP.
    pub profile: u8,
    pub sample_rate: u32,
    pub channel_config: u8,
    pub frame_len: u64,
}

impl AdtsHeader {
    pub fn parse(b: &[u8; 7]) -> Option<Self> {
        if b[0] != 0xFF || b[1] & 0xF6 != 0xF0 {
            return None;
        }
        let profile = b[2] >> 6;
        let sample_rate = *ADTS_SAMPLE_RATES.get(((b[2] >> 2) & 0xF) as usize)?;
        let channel_config = ((b[2] & 0x1) << 2) | (b[3] >> 6);
        let frame_len = (((b[3] & 0x3) as u64) << 11) | ((b[4] as u64) << 3) | ((b[5] as u64) >> 5);
        if frame_len < 7 {
            return None;
        }
        Some(AdtsHeader {
            profile,
            sample_rate,
            channel_config,
            frame_len,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MpegAudio {
    Layer {
        first: FrameHeader,
        frames: u64,
        /// Sum of per-frame bitrates, for averaging.
        bitrate_sum: u64,
        bytes: u64,
    },
    Adts {
        first: AdtsHeader,
        frames: u64,
        bytes: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MpegRaw {
    pub tags: TagSet,
    pub audio: Option<MpegAudio>,
}

pub fn read(c: &mut SourceCursor<'_>, ctx: &ReadContext) -> Parsed<RawFields> {
    let mut raw = MpegRaw::default();
    let mut warnings = Vec::new();
    let error = walk(c, ctx, &mut raw, &mut warnings).err();
    Parsed {
        raw: RawFields::Mpeg(raw),
        warnings,
        error,
    }
}

fn walk<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    ctx: &ReadContext,
    raw: &mut MpegRaw,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let len = c.stream_len();
    if let Some(tag) = id3v2::read_tag(c)? {
        debug!(version = tag.major_version, "ID3v2 tag");
        raw.tags = tag.tags;
        warnings.extend(tag.warnings);
    }
    let audio_start = c.position();

    let mut audio_end = len;
    if len >= audio_start + id3v1::TRAILER_LEN {
        c.seek_to(len - id3v1::TRAILER_LEN)?;
        let block = c.read_bytes(id3v1::TRAILER_LEN)?;
        if let Some(v1) = id3v1::decode(&block) {
            debug!("ID3v1 trailer");
            raw.tags.merge_missing(&v1);
            audio_end = len - id3v1::TRAILER_LEN;
        }
    }
    c.seek_to(audio_start)?;

    let first = find_first_frame(c, audio_end)?;
    match first {
        FirstFrame::Layer(offset, hdr) => {
            debug!(offset, ?hdr, "first MPEG frame");
            if ctx.format == MediaFormat::Aac {
                warnings.push("file named as AAC contains MPEG layer audio".to_string());
            }
            walk_layer_frames(c, offset, hdr, audio_end, raw, warnings)
        }
        FirstFrame::Adts(offset, hdr) => {
            debug!(offset, ?hdr, "first ADTS frame");
            walk_adts_frames(c, offset, hdr, audio_end, raw, warnings)
        }
    }
}

enum FirstFrame {
    Layer(u64, FrameHeader),
    Adts(u64, AdtsHeader),
}

/// Scans forward for a frame header that is followed by another valid
/// header (or the end of the audio), which rules out stray sync patterns.
fn find_first_frame<R: Read + Seek>(c: &mut ParseCursor<R>, audio_end: u64) -> Result<FirstFrame> {
    let start = c.position();
    let window = c.peek_bytes(SYNC_SEARCH_LEN.min(audio_end.saturating_sub(start)))?;
    for i in 0..window.len().saturating_sub(3) {
        if window[i] != 0xFF {
            continue;
        }
        let offset = start + i as u64;
        if let Some(b) = window.get(i..i + 7).and_then(|s| <&[u8; 7]>::try_from(s).ok()) {
            if let Some(h) = AdtsHeader::parse(b) {
                if confirms(&window, i as u64 + h.frame_len, offset + h.frame_len, audio_end, true) {
                    return Ok(FirstFrame::Adts(offset, h));
                }
            }
        }
        let b = [window[i], window[i + 1], window[i + 2], window[i + 3]];
        if let Some(h) = FrameHeader::parse(b) {
            if confirms(&window, i as u64 + h.frame_len(), offset + h.frame_len(), audio_end, false) {
                return Ok(FirstFrame::Layer(offset, h));
            }
        }
    }
    Err(ParseError::malformed(start, "no MPEG audio frame found"))
}

fn confirms(window: &[u8], next_in_window: u64, next_abs: u64, audio_end: u64, adts: bool) -> bool {
    if next_abs >= audio_end {
        return true;
    }
    let i = next_in_window as usize;
    let Some(next) = window.get(i..i + 7) else {
        // beyond the search window: accept rather than guess
        return true;
    };
    if adts {
        <&[u8; 7]>::try_from(next).ok().and_then(AdtsHeader::parse).is_some()
    } else {
        FrameHeader::parse([next[0], next[1], next[2], next[3]]).is_some()
    }
}

fn walk_layer_frames<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    mut pos: u64,
    first: FrameHeader,
    audio_end: u64,
    raw: &mut MpegRaw,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let start = pos;
    let mut frames = 0u64;
    let mut bitrate_sum = 0u64;
    let result = (|| -> Result<()> {
        while pos + 4 <= audio_end {
            c.seek_to(pos)?;
            let Some(h) = FrameHeader::parse(c.read_array()?) else {
                warnings.push(format!("lost frame sync at offset {pos}"));
                break;
            };
            let flen = h.frame_len();
            if pos + flen > audio_end {
                if pos + flen > c.stream_len() {
                    return Err(ParseError::truncated(pos, flen, c.stream_len() - pos));
                }
                warnings.push(format!("frame at offset {pos} runs into the ID3v1 trailer"));
                break;
            }
            trace!(pos, bitrate = h.bitrate_kbps, "frame");
            frames += 1;
            bitrate_sum += h.bitrate_kbps as u64;
            pos += flen;
        }
        if pos < audio_end && pos + 4 > audio_end && frames > 0 {
            return Err(ParseError::truncated(pos, 4, audio_end - pos));
        }
        Ok(())
    })();
    if frames > 0 {
        raw.audio = Some(MpegAudio::Layer {
            first,
            frames,
            bitrate_sum,
            bytes: pos - start,
        });
    }
    result
}

fn walk_adts_frames<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    mut pos: u64,
    first: AdtsHeader,
    audio_end: u64,
    raw: &mut MpegRaw,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let start = pos;
    let mut frames = 0u64;
    let result = (|| -> Result<()> {
        while pos + 7 <= audio_end {
            c.seek_to(pos)?;
            let Some(h) = AdtsHeader::parse(&c.read_array()?) else {
                warnings.push(format!("lost ADTS sync at offset {pos}"));
                break;
            };
            if pos + h.frame_len > audio_end {
                return Err(ParseError::truncated(pos, h.frame_len, audio_end - pos));
            }
            frames += 1;
            pos += h.frame_len;
        }
        if pos < audio_end && pos + 7 > audio_end {
            return Err(ParseError::truncated(pos, 7, audio_end - pos));
        }
        Ok(())
    })();
    if frames > 0 {
        raw.audio = Some(MpegAudio::Adts {
            first,
            frames,
            bytes: pos - start,
        });
    }
    result
}
