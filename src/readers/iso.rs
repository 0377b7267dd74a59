//! ISO base media file reader (MP4, MOV, M4A).
//!
//! The box structure is first read into a tree of [`AtomNode`]s (headers
//! only), then the handful of leaf boxes that carry metadata are decoded by
//! seeking back to their payloads.

use super::{depth_exceeded, Parsed, RawFields, ReadContext, SourceCursor};
use crate::cursor::ParseCursor;
use crate::error::{ParseError, Result};
use crate::fourcc::FourCC;
use crate::record::{StreamKind, TagSet};
use crate::tags::ilst;
use crate::vint::{read_extended_size, BoxSize};
use std::io::{Read, Seek};
use tracing::{debug, trace};

/// Largest `ilst` item payload read into memory.
const MAX_ITEM_LEN: u64 = 1 << 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoRaw {
    pub major_brand: Option<FourCC>,
    pub movie_timescale: Option<u32>,
    pub movie_duration: Option<u64>,
    pub tracks: Vec<IsoTrack>,
    pub tags: TagSet,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoTrack {
    /// `hdlr` handler type: `vide`, `soun`, `text`, `sbtl`, `subt`, ...
    pub handler: Option<FourCC>,
    /// `tkhd` presentation size, integer part of the 16.16 values.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub timescale: Option<u32>,
    pub duration: Option<u64>,
    pub language: Option<String>,
    pub entry: Option<SampleEntry>,
    /// Totals over the `stts` table.
    pub sample_count: u64,
    pub sample_ticks: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleEntry {
    pub format: FourCC,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub channels: Option<u16>,
    pub sample_size: Option<u16>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    pub typ: FourCC,
    pub start: u64,
    pub header_size: u64,
    /// Total size including the header, with the size-0 case resolved.
    pub size: u64,
}

impl AtomHeader {
    pub fn data_start(&self) -> u64 {
        self.start + self.header_size
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.size)
    }

    pub fn data_len(&self) -> u64 {
        self.size - self.header_size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomNode {
    Container { hdr: AtomHeader, children: Vec<AtomNode> },
    Leaf { hdr: AtomHeader },
}

impl AtomNode {
    pub fn hdr(&self) -> &AtomHeader {
        match self {
            AtomNode::Container { hdr, .. } | AtomNode::Leaf { hdr } => hdr,
        }
    }

    fn children(&self) -> &[AtomNode] {
        match self {
            AtomNode::Container { children, .. } => children,
            AtomNode::Leaf { .. } => &[],
        }
    }

    fn child(&self, typ: &[u8; 4]) -> Option<&AtomNode> {
        self.children().iter().find(|n| n.hdr().typ == typ)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtomClass {
    Container,
    /// `meta`: a full box (version/flags) in ISO files, a plain container in
    /// QuickTime files.
    Meta,
    Leaf,
}

fn classify(typ: FourCC) -> AtomClass {
    match &typ.0 {
        b"moov" | b"trak" | b"mdia" | b"minf" | b"stbl" | b"udta" | b"ilst" | b"edts"
        | b"dinf" => AtomClass::Container,
        b"meta" => AtomClass::Meta,
        _ => AtomClass::Leaf,
    }
}

pub fn read(c: &mut SourceCursor<'_>, ctx: &ReadContext) -> Parsed<RawFields> {
    let mut top = Vec::new();
    let mut error = None;
    let end = c.stream_len();
    while c.position() + 8 <= end {
        match read_atom(c, end, 0, ctx) {
            Ok(node) => top.push(node),
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }
    if error.is_none() && c.position() < end {
        error = Some(ParseError::truncated(c.position(), 8, end - c.position()));
    }

    let mut raw = IsoRaw::default();
    if let Err(e) = interpret(c, &top, &mut raw) {
        error.get_or_insert(e);
    }
    if error.is_none() && !top.iter().any(|n| n.hdr().typ == b"moov") {
        error = Some(ParseError::malformed(0, "no moov atom"));
    }
    Parsed {
        raw: RawFields::Iso(raw),
        warnings: Vec::new(),
        error,
    }
}

pub fn read_atom_header<R: Read + Seek>(c: &mut ParseCursor<R>, parent_end: u64) -> Result<AtomHeader> {
    let start = c.position();
    let size32 = c.read_u32_be()?;
    let typ = FourCC(c.read_array()?);
    let (size, size_bytes) = read_extended_size(c, size32)?;
    let mut header_size = size_bytes + 4;
    if &typ.0 == b"uuid" {
        c.skip(16)?;
        header_size += 16;
    }
    let size = match size {
        BoxSize::Sized(n) => n,
        BoxSize::ToEnd => parent_end.saturating_sub(start),
    };
    if size < header_size {
        return Err(ParseError::malformed(
            start,
            format!("atom '{typ}' size {size} is smaller than its header"),
        ));
    }
    let hdr = AtomHeader {
        typ,
        start,
        header_size,
        size,
    };
    if hdr.end() > parent_end {
        if hdr.end() > c.stream_len() {
            return Err(ParseError::truncated(
                hdr.data_start(),
                hdr.data_len(),
                c.stream_len().saturating_sub(hdr.data_start()),
            ));
        }
        return Err(ParseError::malformed(
            start,
            format!("atom '{typ}' overruns its parent"),
        ));
    }
    Ok(hdr)
}

/// Reads one atom at the cursor, recursing into containers, and leaves the
/// cursor at the atom's end.
fn read_atom<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    parent_end: u64,
    depth: u32,
    ctx: &ReadContext,
) -> Result<AtomNode> {
    let hdr = read_atom_header(c, parent_end)?;
    trace!(typ = %hdr.typ, size = hdr.size, offset = hdr.start, depth, "atom");
    let node = match classify(hdr.typ) {
        AtomClass::Leaf => AtomNode::Leaf { hdr },
        class => {
            let mut first_child = hdr.data_start();
            if class == AtomClass::Meta && !is_quicktime_meta(c, &hdr)? {
                first_child += 4;
            }
            c.seek_to(first_child.min(hdr.end()))?;
            let children = read_children(c, hdr.end(), depth + 1, ctx)?;
            AtomNode::Container { hdr, children }
        }
    };
    c.seek_to(hdr.end())?;
    Ok(node)
}

fn read_children<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    end: u64,
    depth: u32,
    ctx: &ReadContext,
) -> Result<Vec<AtomNode>> {
    if depth > ctx.max_depth {
        return Err(depth_exceeded(c.position(), ctx.max_depth));
    }
    let mut kids = Vec::new();
    while c.position() + 8 <= end {
        kids.push(read_atom(c, end, depth, ctx)?);
    }
    Ok(kids)
}

/// QuickTime `meta` has no version/flags: its first child header starts
/// immediately, so the handler type sits at offset 4 instead of 8.
fn is_quicktime_meta<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &AtomHeader) -> Result<bool> {
    c.seek_to(hdr.data_start())?;
    let probe = c.peek_bytes(8.min(hdr.data_len()))?;
    Ok(probe.get(4..8) == Some(b"hdlr".as_slice()))
}

fn interpret<R: Read + Seek>(c: &mut ParseCursor<R>, top: &[AtomNode], raw: &mut IsoRaw) -> Result<()> {
    if let Some(ftyp) = top.iter().find(|n| n.hdr().typ == b"ftyp") {
        c.seek_to(ftyp.hdr().data_start())?;
        raw.major_brand = Some(FourCC(c.read_array()?));
    }
    let Some(moov) = top.iter().find(|n| n.hdr().typ == b"moov") else {
        return Ok(());
    };
    if let Some(mvhd) = moov.child(b"mvhd") {
        let (timescale, duration) = decode_time_header(c, mvhd.hdr())?;
        raw.movie_timescale = Some(timescale);
        raw.movie_duration = Some(duration);
        debug!(timescale, duration, "mvhd");
    }
    for trak in moov.children().iter().filter(|n| n.hdr().typ == b"trak") {
        raw.tracks.push(decode_track(c, trak)?);
    }
    // iTunes puts meta under udta; some muxers put it directly under moov
    let metas = [moov.child(b"udta").and_then(|u| u.child(b"meta")), moov.child(b"meta")];
    for ilst in metas.into_iter().flatten().filter_map(|m| m.child(b"ilst")) {
        let tags = decode_ilst(c, ilst)?;
        raw.tags.merge_missing(&tags);
    }
    Ok(())
}

fn decode_track<R: Read + Seek>(c: &mut ParseCursor<R>, trak: &AtomNode) -> Result<IsoTrack> {
    let mut track = IsoTrack::default();
    if let Some(tkhd) = trak.child(b"tkhd") {
        let (w, h) = decode_tkhd(c, tkhd.hdr())?;
        track.width = (w > 0).then_some(w);
        track.height = (h > 0).then_some(h);
    }
    let Some(mdia) = trak.child(b"mdia") else {
        return Ok(track);
    };
    if let Some(mdhd) = mdia.child(b"mdhd") {
        let (timescale, duration) = decode_time_header(c, mdhd.hdr())?;
        track.timescale = Some(timescale);
        track.duration = Some(duration);
        track.language = decode_mdhd_language(c, mdhd.hdr())?;
    }
    if let Some(hdlr) = mdia.child(b"hdlr") {
        track.handler = Some(decode_hdlr(c, hdlr.hdr())?);
    }
    let Some(stbl) = mdia.child(b"minf").and_then(|m| m.child(b"stbl")) else {
        return Ok(track);
    };
    if let Some(stsd) = stbl.child(b"stsd") {
        track.entry = decode_stsd(c, stsd.hdr(), handler_kind(track.handler))?;
    }
    if let Some(stts) = stbl.child(b"stts") {
        let (count, ticks) = decode_stts(c, stts.hdr())?;
        track.sample_count = count;
        track.sample_ticks = ticks;
    }
    debug!(handler = ?track.handler, entry = ?track.entry.as_ref().map(|e| e.format), "track");
    Ok(track)
}

pub fn handler_kind(handler: Option<FourCC>) -> Option<StreamKind> {
    match &handler?.0 {
        b"vide" => Some(StreamKind::Video),
        b"soun" => Some(StreamKind::Audio),
        b"text" | b"sbtl" | b"subt" | b"clcp" => Some(StreamKind::Subtitle),
        _ => None,
    }
}

/// Positions the cursor after the version/flags of a full box and runs `f`
/// bounded to the box payload.
fn with_full_box<R: Read + Seek, T>(
    c: &mut ParseCursor<R>,
    hdr: &AtomHeader,
    f: impl FnOnce(&mut ParseCursor<R>, u8) -> Result<T>,
) -> Result<T> {
    c.seek_to(hdr.data_start())?;
    c.with_limit(hdr.data_len(), |c| {
        let version = c.read_u8()?;
        c.skip(3)?;
        f(c, version)
    })
}

/// `mvhd` and `mdhd` share their leading layout: times, timescale, duration.
fn decode_time_header<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &AtomHeader) -> Result<(u32, u64)> {
    with_full_box(c, hdr, |c, version| {
        if version == 1 {
            c.skip(16)?;
            let timescale = c.read_u32_be()?;
            Ok((timescale, c.read_u64_be()?))
        } else {
            c.skip(8)?;
            let timescale = c.read_u32_be()?;
            Ok((timescale, c.read_u32_be()? as u64))
        }
    })
}

fn decode_mdhd_language<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &AtomHeader) -> Result<Option<String>> {
    with_full_box(c, hdr, |c, version| {
        c.skip(if version == 1 { 28 } else { 16 })?;
        let packed = c.read_u16_be()?;
        let lang = lang_from_u16(packed);
        Ok((lang != "und" && lang.chars().all(|ch| ch.is_ascii_lowercase())).then_some(lang))
    })
}

/// ISO-639-2/T code packed as three 5-bit letters offset by 0x60.
pub fn lang_from_u16(code: u16) -> String {
    [(code >> 10) & 0x1F, (code >> 5) & 0x1F, code & 0x1F]
        .iter()
        .map(|&c| (c as u8 + 0x60) as char)
        .collect()
}

fn decode_tkhd<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &AtomHeader) -> Result<(u32, u32)> {
    with_full_box(c, hdr, |c, version| {
        // times, track id, reserved, duration; then reserved, layer,
        // alternate group, volume, reserved and the matrix
        c.skip(if version == 1 { 32 } else { 20 })?;
        c.skip(52)?;
        let width = c.read_u32_be()? >> 16;
        let height = c.read_u32_be()? >> 16;
        Ok((width, height))
    })
}

fn decode_hdlr<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &AtomHeader) -> Result<FourCC> {
    with_full_box(c, hdr, |c, _| {
        c.skip(4)?;
        Ok(FourCC(c.read_array()?))
    })
}

/// First sample entry of an `stsd`. Offsets below are relative to the entry
/// start (its size field).
fn decode_stsd<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    hdr: &AtomHeader,
    kind: Option<StreamKind>,
) -> Result<Option<SampleEntry>> {
    with_full_box(c, hdr, |c, _| {
        let entry_count = c.read_u32_be()?;
        if entry_count == 0 {
            return Ok(None);
        }
        let entry_start = c.position();
        let entry_size = c.read_u32_be()? as u64;
        if entry_size < 16 {
            return Err(ParseError::malformed(entry_start, "sample entry shorter than its header"));
        }
        let format = FourCC(c.read_array()?);
        let kind = kind.or_else(|| crate::codecs::iso_sample_entry(&format.to_string()).map(|(_, k)| k));
        c.with_limit(entry_size - 8, |c| {
            let mut entry = SampleEntry {
                format,
                width: None,
                height: None,
                channels: None,
                sample_size: None,
                sample_rate: None,
            };
            match kind {
                Some(StreamKind::Video) if entry_size >= 36 => {
                    c.seek_to(entry_start + 32)?;
                    entry.width = Some(c.read_u16_be()?);
                    entry.height = Some(c.read_u16_be()?);
                }
                Some(StreamKind::Audio) if entry_size >= 36 => {
                    c.seek_to(entry_start + 24)?;
                    entry.channels = Some(c.read_u16_be()?);
                    entry.sample_size = Some(c.read_u16_be()?);
                    c.seek_to(entry_start + 32)?;
                    entry.sample_rate = Some(c.read_u32_be()? >> 16);
                }
                _ => {}
            }
            Ok(Some(entry))
        })
    })
}

/// Total sample count and total duration in media ticks.
fn decode_stts<R: Read + Seek>(c: &mut ParseCursor<R>, hdr: &AtomHeader) -> Result<(u64, u64)> {
    with_full_box(c, hdr, |c, _| {
        let entry_count = c.read_u32_be()? as u64;
        if entry_count * 8 > c.remaining() {
            return Err(ParseError::malformed(
                c.position(),
                format!("stts declares {entry_count} entries but has room for {}", c.remaining() / 8),
            ));
        }
        let mut samples = 0u64;
        let mut ticks = 0u64;
        for _ in 0..entry_count {
            let at = c.position();
            let count = c.read_u32_be()? as u64;
            let delta = c.read_u32_be()? as u64;
            samples += count;
            ticks = count
                .checked_mul(delta)
                .and_then(|t| ticks.checked_add(t))
                .ok_or_else(|| ParseError::malformed(at, "stts duration overflows"))?;
        }
        Ok((samples, ticks))
    })
}

fn decode_ilst<R: Read + Seek>(c: &mut ParseCursor<R>, ilst: &AtomNode) -> Result<TagSet> {
    let mut tags = TagSet::new();
    for item in ilst.children() {
        let hdr = item.hdr();
        if !ilst::is_mapped(&hdr.typ.0) || hdr.data_len() > MAX_ITEM_LEN {
            continue;
        }
        c.seek_to(hdr.data_start())?;
        let payload = c.read_bytes(hdr.data_len())?;
        if let Some((key, value)) = ilst::decode_item(&hdr.typ.0, &payload) {
            tags.set_if_absent(key, value);
        }
    }
    Ok(tags)
}
