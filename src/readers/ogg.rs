//! Ogg page reader (Vorbis and Opus).
//!
//! Only the first logical bitstream is described. Its first two packets are
//! reassembled from page segments: the identification header and the comment
//! header. Every page is visited so that the last granule position and the
//! end-of-stream flag can be checked.

use super::{Parsed, RawFields, ReadContext, SourceCursor};
use crate::cursor::ParseCursor;
use crate::error::{ParseError, Result};
use crate::record::TagSet;
use crate::tags::vorbis;
use std::io::{Read, Seek};
use tracing::{debug, trace};

const FLAG_EOS: u8 = 0x04;
const GRANULE_NONE: u64 = u64::MAX;
/// Header packets larger than this (embedded cover art) are not buffered.
const MAX_HEADER_PACKET: usize = 4 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OggCodec {
    Vorbis,
    Opus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OggRaw {
    pub codec: Option<OggCodec>,
    pub channels: u8,
    /// Vorbis: stream rate. Opus: the original input rate (playback is 48 kHz).
    pub sample_rate: u32,
    pub nominal_bitrate: Option<u32>,
    /// Opus pre-skip in 48 kHz samples.
    pub pre_skip: u16,
    pub last_granule: Option<u64>,
    pub vendor: Option<String>,
    pub tags: TagSet,
    /// Logical streams other than the first.
    pub other_streams: u32,
}

#[derive(Debug, Clone)]
struct PageHeader {
    start: u64,
    header_type: u8,
    granule: u64,
    serial: u32,
    segments: Vec<u8>,
}

impl PageHeader {
    fn payload_len(&self) -> u64 {
        self.segments.iter().map(|&s| s as u64).sum()
    }
}

/// Packets of the first logical stream, reassembled across segments.
#[derive(Debug, Default)]
struct PacketCollector {
    done: Vec<Vec<u8>>,
    partial: Vec<u8>,
    oversized: bool,
}

impl PacketCollector {
    fn wants_more(&self) -> bool {
        self.done.len() < 2
    }

    fn push_page(&mut self, payload: &[u8], segments: &[u8]) {
        let mut off = 0usize;
        for &seg in segments {
            let seg = seg as usize;
            let Some(bytes) = payload.get(off..off + seg) else { return };
            off += seg;
            if self.partial.len() + seg <= MAX_HEADER_PACKET {
                self.partial.extend_from_slice(bytes);
            } else {
                self.oversized = true;
            }
            // a lacing value below 255 terminates the packet
            if seg < 255 {
                self.done.push(std::mem::take(&mut self.partial));
                if !self.wants_more() {
                    return;
                }
            }
        }
    }
}

pub fn read(c: &mut SourceCursor<'_>, _ctx: &ReadContext) -> Parsed<RawFields> {
    let mut raw = OggRaw::default();
    let mut warnings = Vec::new();
    let error = walk(c, &mut raw, &mut warnings).err();
    Parsed {
        raw: RawFields::Ogg(raw),
        warnings,
        error,
    }
}

fn walk<R: Read + Seek>(c: &mut ParseCursor<R>, raw: &mut OggRaw, warnings: &mut Vec<String>) -> Result<()> {
    let end = c.stream_len();
    let mut first_serial = None;
    let mut other_serials = Vec::new();
    let mut packets = PacketCollector::default();
    let mut saw_eos = false;
    let mut pages = 0u64;

    // the page walk may fail part way; headers gathered so far still count
    let walked = (|| -> Result<()> {
        while c.position() < end {
            let page = read_page_header(c)?;
            let payload_len = page.payload_len();
            c.ensure_within(c.position() + payload_len)?;
            pages += 1;
            trace!(offset = page.start, serial = page.serial, granule = page.granule, "page");

            let serial = *first_serial.get_or_insert(page.serial);
            if page.serial != serial {
                if !other_serials.contains(&page.serial) {
                    other_serials.push(page.serial);
                }
                c.skip(payload_len)?;
                continue;
            }
            if packets.wants_more() {
                let payload = c.read_bytes(payload_len)?;
                packets.push_page(&payload, &page.segments);
            } else {
                c.skip(payload_len)?;
            }
            if page.granule != GRANULE_NONE {
                raw.last_granule = Some(page.granule);
            }
            if page.header_type & FLAG_EOS != 0 {
                saw_eos = true;
            }
        }
        Ok(())
    })();

    raw.other_streams = other_serials.len() as u32;
    let usable = if packets.oversized {
        warnings.push("comment header too large; tags skipped".to_string());
        packets.done.len().min(1)
    } else {
        packets.done.len()
    };
    debug!(pages, "Ogg pages walked");
    let headers = interpret_headers(&packets.done[..usable], raw);
    walked?;
    headers?;
    if raw.other_streams > 0 {
        warnings.push(format!(
            "{} additional logical stream(s) not described",
            raw.other_streams
        ));
    }
    if !saw_eos {
        return Err(ParseError::truncated(end, 27, 0));
    }
    Ok(())
}

fn read_page_header<R: Read + Seek>(c: &mut ParseCursor<R>) -> Result<PageHeader> {
    let start = c.position();
    let magic: [u8; 4] = c.read_array()?;
    if &magic != b"OggS" {
        return Err(ParseError::malformed(start, "missing OggS capture pattern"));
    }
    let version = c.read_u8()?;
    if version != 0 {
        return Err(ParseError::malformed(start + 4, format!("unsupported Ogg version {version}")));
    }
    let header_type = c.read_u8()?;
    let granule = c.read_u64_le()?;
    let serial = c.read_u32_le()?;
    let _sequence = c.read_u32_le()?;
    let _crc = c.read_u32_le()?;
    let count = c.read_u8()? as u64;
    let segments = c.read_bytes(count)?;
    Ok(PageHeader {
        start,
        header_type,
        granule,
        serial,
        segments,
    })
}

fn interpret_headers(packets: &[Vec<u8>], raw: &mut OggRaw) -> Result<()> {
    let Some(ident) = packets.first() else {
        return Err(ParseError::malformed(0, "no identification packet"));
    };
    let mut r = ParseCursor::from_slice(ident);
    if ident.starts_with(b"\x01vorbis") {
        r.skip(7)?;
        let _version = r.read_u32_le()?;
        raw.codec = Some(OggCodec::Vorbis);
        raw.channels = r.read_u8()?;
        raw.sample_rate = r.read_u32_le()?;
        let _max = r.read_u32_le()?;
        let nominal = r.read_u32_le()? as i32;
        raw.nominal_bitrate = (nominal > 0).then_some(nominal as u32);
    } else if ident.starts_with(b"OpusHead") {
        r.skip(8)?;
        let _version = r.read_u8()?;
        raw.codec = Some(OggCodec::Opus);
        raw.channels = r.read_u8()?;
        raw.pre_skip = r.read_u16_le()?;
        raw.sample_rate = r.read_u32_le()?;
    } else {
        return Err(ParseError::malformed(0, "unrecognized Ogg identification header"));
    }
    debug!(codec = ?raw.codec, channels = raw.channels, rate = raw.sample_rate, "Ogg ident");

    let Some(comment) = packets.get(1) else {
        return Ok(());
    };
    let block = match raw.codec {
        Some(OggCodec::Vorbis) => comment.strip_prefix(b"\x03vorbis"),
        Some(OggCodec::Opus) => comment.strip_prefix(b"OpusTags"),
        None => None,
    };
    if let Some(block) = block {
        let vc = vorbis::decode(block)?;
        raw.vendor = Some(vc.vendor);
        raw.tags = vc.tags;
    }
    Ok(())
}
