//! EBML reader for Matroska and WebM.

use super::{depth_exceeded, Parsed, RawFields, ReadContext, SourceCursor};
use crate::cursor::ParseCursor;
use crate::error::{ParseError, Result};
use crate::record::{TagKey, TagSet};
use crate::tags::normalize_year;
use crate::vint::{read_element_id, read_element_size, UNKNOWN_SIZE};
use std::io::{Read, Seek};
use tracing::{debug, trace, warn};

pub mod ids {
    pub const EBML: u32 = 0x1A45DFA3;
    pub const DOC_TYPE: u32 = 0x4282;
    pub const SEGMENT: u32 = 0x18538067;
    pub const INFO: u32 = 0x1549A966;
    pub const TIMESTAMP_SCALE: u32 = 0x2AD7B1;
    pub const DURATION: u32 = 0x4489;
    pub const TITLE: u32 = 0x7BA9;
    pub const TRACKS: u32 = 0x1654AE6B;
    pub const TRACK_ENTRY: u32 = 0xAE;
    pub const TRACK_NUMBER: u32 = 0xD7;
    pub const TRACK_TYPE: u32 = 0x83;
    pub const CODEC_ID: u32 = 0x86;
    pub const LANGUAGE: u32 = 0x22B59C;
    pub const DEFAULT_DURATION: u32 = 0x23E383;
    pub const VIDEO: u32 = 0xE0;
    pub const PIXEL_WIDTH: u32 = 0xB0;
    pub const PIXEL_HEIGHT: u32 = 0xBA;
    pub const FRAME_RATE: u32 = 0x2383E3;
    pub const AUDIO: u32 = 0xE1;
    pub const SAMPLING_FREQUENCY: u32 = 0xB5;
    pub const CHANNELS: u32 = 0x9F;
    pub const BIT_DEPTH: u32 = 0x6264;
    pub const CLUSTER: u32 = 0x1F43B675;
    pub const TAGS: u32 = 0x1254C367;
    pub const TAG: u32 = 0x7373;
    pub const SIMPLE_TAG: u32 = 0x67C8;
    pub const TAG_NAME: u32 = 0x45A3;
    pub const TAG_STRING: u32 = 0x4487;
}

pub const DEFAULT_TIMESTAMP_SCALE: u64 = 1_000_000;

/// Longest string element read into memory.
const MAX_STRING_LEN: u64 = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct EbmlRaw {
    pub doc_type: Option<String>,
    /// Nanoseconds per timestamp tick.
    pub timestamp_scale: u64,
    /// Segment duration in ticks.
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub tracks: Vec<EbmlTrack>,
    pub tags: TagSet,
}

impl Default for EbmlRaw {
    fn default() -> Self {
        EbmlRaw {
            doc_type: None,
            timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
            duration: None,
            title: None,
            tracks: Vec::new(),
            tags: TagSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EbmlTrack {
    pub number: Option<u64>,
    /// 1 video, 2 audio, 17 subtitle.
    pub track_type: Option<u64>,
    pub codec_id: Option<String>,
    pub language: Option<String>,
    pub default_duration_ns: Option<u64>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub frame_rate: Option<f64>,
    pub sampling_frequency: Option<f64>,
    pub channels: Option<u64>,
    pub bit_depth: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ElementHeader {
    pub id: u32,
    pub start: u64,
    pub data_start: u64,
    /// `None` for unknown-size elements.
    pub size: Option<u64>,
}

impl ElementHeader {
    fn end(&self, parent_end: u64) -> u64 {
        self.size.map_or(parent_end, |s| self.data_start + s)
    }
}

pub fn read(c: &mut SourceCursor<'_>, ctx: &ReadContext) -> Parsed<RawFields> {
    let mut raw = EbmlRaw::default();
    let mut warnings = Vec::new();
    let error = walk(c, ctx, &mut raw, &mut warnings).err();
    Parsed {
        raw: RawFields::Ebml(raw),
        warnings,
        error,
    }
}

pub fn read_element_header<R: Read + Seek>(c: &mut ParseCursor<R>, parent_end: u64) -> Result<ElementHeader> {
    let start = c.position();
    let id = read_element_id(c)?;
    let size = read_element_size(c)?;
    let data_start = c.position();
    let size = (size != UNKNOWN_SIZE).then_some(size);
    if let Some(s) = size {
        let end = data_start.saturating_add(s);
        if end > parent_end {
            if end > c.stream_len() {
                return Err(ParseError::truncated(
                    data_start,
                    s,
                    c.stream_len().saturating_sub(data_start),
                ));
            }
            return Err(ParseError::malformed(
                start,
                format!("element 0x{id:X} overruns its parent"),
            ));
        }
    }
    Ok(ElementHeader {
        id,
        start,
        data_start,
        size,
    })
}

/// Header for an element that must have a known size.
fn sized_element<R: Read + Seek>(c: &mut ParseCursor<R>, parent_end: u64) -> Result<(ElementHeader, u64)> {
    let el = read_element_header(c, parent_end)?;
    match el.size {
        Some(s) => Ok((el, s)),
        None => Err(ParseError::malformed(
            el.start,
            format!("element 0x{:X} has unknown size", el.id),
        )),
    }
}

fn walk<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    ctx: &ReadContext,
    raw: &mut EbmlRaw,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let file_end = c.stream_len();
    let (header, header_len) = sized_element(c, file_end)?;
    if header.id != ids::EBML {
        return Err(ParseError::malformed(0, "missing EBML header"));
    }
    raw.doc_type = read_doc_type(c, header.data_start + header_len)?;
    c.seek_to(header.data_start + header_len)?;
    debug!(doc_type = ?raw.doc_type, "EBML header");

    // Checked against the file below so that a cut Segment keeps its
    // leading children.
    let segment = read_element_header(c, u64::MAX)?;
    if segment.id != ids::SEGMENT {
        return Err(ParseError::malformed(
            segment.start,
            format!("expected Segment, found element 0x{:X}", segment.id),
        ));
    }
    if segment.size.is_none() {
        warnings.push("Segment has unknown size; truncation cannot be detected".to_string());
    }
    let mut segment_end = segment.end(file_end);
    let mut cut_short = None;
    if segment_end > file_end {
        warn!(declared_end = segment_end, len = file_end, "Segment shorter than declared");
        cut_short = Some(ParseError::truncated(
            segment.data_start,
            segment_end - segment.data_start,
            file_end.saturating_sub(segment.data_start),
        ));
        segment_end = file_end;
    }

    let mut saw_info = false;
    while c.position() < segment_end {
        match read_segment_child(c, ctx, raw, segment_end, &mut saw_info) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.is_truncation() => {
                cut_short.get_or_insert(e);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(e) = cut_short {
        return Err(e);
    }

    if !saw_info {
        return Err(ParseError::malformed(segment.data_start, "Segment has no Info element"));
    }
    Ok(())
}

/// Reads one top-level Segment child into `raw`. Returns `false` once the
/// remaining children cannot be walked.
fn read_segment_child<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    ctx: &ReadContext,
    raw: &mut EbmlRaw,
    segment_end: u64,
    saw_info: &mut bool,
) -> Result<bool> {
    let el = read_element_header(c, segment_end)?;
    trace!(id = el.id, offset = el.start, size = ?el.size, "segment child");
    if el.size.is_none() {
        if el.id == ids::CLUSTER {
            debug!(offset = el.start, "unknown-size cluster, stopping");
            return Ok(false);
        }
        return Err(ParseError::malformed(
            el.start,
            format!("element 0x{:X} has unknown size", el.id),
        ));
    }
    let end = el.end(segment_end);
    match el.id {
        ids::INFO => {
            *saw_info = true;
            let info = parse_info(c, end, 2, ctx)?;
            raw.timestamp_scale = info.timestamp_scale;
            raw.duration = info.duration.or(raw.duration);
            raw.title = info.title.or(raw.title.take());
        }
        ids::TRACKS => raw.tracks.extend(parse_tracks(c, end, 2, ctx)?),
        ids::TAGS => raw.tags.merge_missing(&parse_tags(c, end, 2, ctx)?),
        _ => {}
    }
    c.seek_to(end)?;
    Ok(true)
}

fn read_doc_type<R: Read + Seek>(c: &mut ParseCursor<R>, end: u64) -> Result<Option<String>> {
    let mut doc_type = None;
    while c.position() < end {
        let (el, size) = sized_element(c, end)?;
        if el.id == ids::DOC_TYPE {
            doc_type = Some(read_string(c, size)?);
        }
        c.seek_to(el.data_start + size)?;
    }
    Ok(doc_type)
}

fn read_string<R: Read + Seek>(c: &mut ParseCursor<R>, size: u64) -> Result<String> {
    if size > MAX_STRING_LEN {
        return Err(ParseError::malformed(
            c.position(),
            format!("string element of {size} bytes"),
        ));
    }
    let bytes = c.read_bytes(size)?;
    Ok(crate::tags::decode_utf8(&bytes))
}

#[derive(Debug, Default)]
struct InfoFields {
    timestamp_scale: u64,
    duration: Option<f64>,
    title: Option<String>,
}

fn parse_info<R: Read + Seek>(c: &mut ParseCursor<R>, end: u64, depth: u32, ctx: &ReadContext) -> Result<InfoFields> {
    if depth > ctx.max_depth {
        return Err(depth_exceeded(c.position(), ctx.max_depth));
    }
    let mut info = InfoFields {
        timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
        ..Default::default()
    };
    while c.position() < end {
        let (el, size) = sized_element(c, end)?;
        match el.id {
            ids::TIMESTAMP_SCALE => {
                let scale = c.read_uint_be(size)?;
                if scale > 0 {
                    info.timestamp_scale = scale;
                }
            }
            ids::DURATION => info.duration = Some(c.read_float_be(size)?),
            ids::TITLE => info.title = Some(read_string(c, size)?),
            _ => {}
        }
        c.seek_to(el.data_start + size)?;
    }
    debug!(scale = info.timestamp_scale, duration = ?info.duration, "Info");
    Ok(info)
}

fn parse_tracks<R: Read + Seek>(c: &mut ParseCursor<R>, end: u64, depth: u32, ctx: &ReadContext) -> Result<Vec<EbmlTrack>> {
    if depth > ctx.max_depth {
        return Err(depth_exceeded(c.position(), ctx.max_depth));
    }
    let mut tracks = Vec::new();
    while c.position() < end {
        let (el, size) = sized_element(c, end)?;
        if el.id == ids::TRACK_ENTRY {
            tracks.push(parse_track_entry(c, el.data_start + size, depth + 1, ctx)?);
        }
        c.seek_to(el.data_start + size)?;
    }
    Ok(tracks)
}

fn parse_track_entry<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    end: u64,
    depth: u32,
    ctx: &ReadContext,
) -> Result<EbmlTrack> {
    if depth > ctx.max_depth {
        return Err(depth_exceeded(c.position(), ctx.max_depth));
    }
    let mut t = EbmlTrack::default();
    while c.position() < end {
        let (el, size) = sized_element(c, end)?;
        let el_end = el.data_start + size;
        match el.id {
            ids::TRACK_NUMBER => t.number = Some(c.read_uint_be(size)?),
            ids::TRACK_TYPE => t.track_type = Some(c.read_uint_be(size)?),
            ids::CODEC_ID => t.codec_id = Some(read_string(c, size)?),
            ids::LANGUAGE => t.language = Some(read_string(c, size)?),
            ids::DEFAULT_DURATION => t.default_duration_ns = Some(c.read_uint_be(size)?),
            ids::VIDEO | ids::AUDIO => {
                if depth + 1 > ctx.max_depth {
                    return Err(depth_exceeded(el.start, ctx.max_depth));
                }
                while c.position() < el_end {
                    let (sub, sub_size) = sized_element(c, el_end)?;
                    match sub.id {
                        ids::PIXEL_WIDTH => t.width = Some(c.read_uint_be(sub_size)?),
                        ids::PIXEL_HEIGHT => t.height = Some(c.read_uint_be(sub_size)?),
                        ids::FRAME_RATE => t.frame_rate = Some(c.read_float_be(sub_size)?),
                        ids::SAMPLING_FREQUENCY => t.sampling_frequency = Some(c.read_float_be(sub_size)?),
                        ids::CHANNELS => t.channels = Some(c.read_uint_be(sub_size)?),
                        ids::BIT_DEPTH => t.bit_depth = Some(c.read_uint_be(sub_size)?),
                        _ => {}
                    }
                    c.seek_to(sub.data_start + sub_size)?;
                }
            }
            _ => {}
        }
        c.seek_to(el_end)?;
    }
    debug!(number = ?t.number, codec = ?t.codec_id, "TrackEntry");
    Ok(t)
}

fn parse_tags<R: Read + Seek>(c: &mut ParseCursor<R>, end: u64, depth: u32, ctx: &ReadContext) -> Result<TagSet> {
    if depth > ctx.max_depth {
        return Err(depth_exceeded(c.position(), ctx.max_depth));
    }
    let mut tags = TagSet::new();
    while c.position() < end {
        let (el, size) = sized_element(c, end)?;
        if el.id == ids::TAG {
            let tag_end = el.data_start + size;
            while c.position() < tag_end {
                let (sub, sub_size) = sized_element(c, tag_end)?;
                if sub.id == ids::SIMPLE_TAG {
                    parse_simple_tag(c, sub.data_start + sub_size, depth + 2, ctx, &mut tags)?;
                }
                c.seek_to(sub.data_start + sub_size)?;
            }
        }
        c.seek_to(el.data_start + size)?;
    }
    Ok(tags)
}

/// SimpleTags may nest; nested ones are visited with an increased depth.
fn parse_simple_tag<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    end: u64,
    depth: u32,
    ctx: &ReadContext,
    tags: &mut TagSet,
) -> Result<()> {
    if depth > ctx.max_depth {
        return Err(depth_exceeded(c.position(), ctx.max_depth));
    }
    let mut name = None;
    let mut value = None;
    while c.position() < end {
        let (el, size) = sized_element(c, end)?;
        match el.id {
            ids::TAG_NAME => name = Some(read_string(c, size)?),
            ids::TAG_STRING => value = Some(read_string(c, size)?),
            ids::SIMPLE_TAG => parse_simple_tag(c, el.data_start + size, depth + 1, ctx, tags)?,
            _ => {}
        }
        c.seek_to(el.data_start + size)?;
    }
    if let (Some(name), Some(value)) = (name, value) {
        match name.to_ascii_uppercase().as_str() {
            "TITLE" => tags.set_if_absent(TagKey::Title, value),
            "ARTIST" => tags.set_if_absent(TagKey::Artist, value),
            "ALBUM" => tags.set_if_absent(TagKey::Album, value),
            "DATE_RELEASED" | "DATE_RECORDED" | "DATE" => {
                if let Some(y) = normalize_year(&value) {
                    tags.set_if_absent(TagKey::Year, y);
                }
            }
            "GENRE" => tags.set_if_absent(TagKey::Genre, value),
            "PART_NUMBER" | "TRACKNUMBER" => tags.set_if_absent(TagKey::Track, value),
            "COMMENT" | "DESCRIPTION" => tags.set_if_absent(TagKey::Comment, value),
            _ => {}
        }
    }
    Ok(())
}
