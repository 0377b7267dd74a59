//! FLV tag stream and the AMF0 `onMetaData` script object.

use super::{Parsed, RawFields, ReadContext, SourceCursor, depth_exceeded};
use crate::cursor::ParseCursor;
use crate::error::{ParseError, Result};
use std::collections::BTreeMap;
use std::io::{Read, Seek};
use tracing::{debug, trace, warn};

const TAG_AUDIO: u8 = 8;
const TAG_VIDEO: u8 = 9;
const TAG_SCRIPT: u8 = 18;
const TAG_HEADER_LEN: u64 = 11;
/// Script tags larger than this are not decoded.
const MAX_SCRIPT_TAG: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvAudio {
    pub codec_id: u8,
    pub rate_index: u8,
    pub sixteen_bit: bool,
    pub stereo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvVideo {
    pub codec_id: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlvRaw {
    pub has_audio_flag: bool,
    pub has_video_flag: bool,
    /// First audio tag seen.
    pub audio: Option<FlvAudio>,
    /// First video tag seen.
    pub video: Option<FlvVideo>,
    pub max_timestamp_ms: u32,
    pub video_frames: u64,
    pub audio_bytes: u64,
    pub video_bytes: u64,
    /// Numeric and boolean `onMetaData` entries.
    pub meta: BTreeMap<String, f64>,
}

impl FlvRaw {
    pub fn meta(&self, key: &str) -> Option<f64> {
        self.meta.get(key).copied().filter(|v| v.is_finite())
    }
}

pub fn read(c: &mut SourceCursor<'_>, ctx: &ReadContext) -> Parsed<RawFields> {
    let mut raw = FlvRaw::default();
    let mut warnings = Vec::new();
    let error = walk(c, ctx, &mut raw, &mut warnings).err();
    Parsed {
        raw: RawFields::Flv(raw),
        warnings,
        error,
    }
}

fn walk<R: Read + Seek>(
    c: &mut ParseCursor<R>,
    ctx: &ReadContext,
    raw: &mut FlvRaw,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let sig: [u8; 3] = c.read_array()?;
    if &sig != b"FLV" {
        return Err(ParseError::malformed(0, "missing FLV signature"));
    }
    let version = c.read_u8()?;
    let flags = c.read_u8()?;
    raw.has_audio_flag = flags & 0x04 != 0;
    raw.has_video_flag = flags & 0x01 != 0;
    let header_len = c.read_u32_be()? as u64;
    if header_len < 9 {
        return Err(ParseError::malformed(5, format!("FLV header size {header_len}")));
    }
    debug!(version, flags, header_len, "FLV header");
    c.seek_to(header_len)?;

    let end = c.stream_len();
    let mut prev_size = c.read_u32_be()?;
    if prev_size != 0 {
        warnings.push(format!("first previous-tag-size is {prev_size}, expected 0"));
    }
    let mut expected_prev = 0u32;
    let mut tags = 0u64;
    while c.position() < end {
        if prev_size != expected_prev && tags > 0 {
            warn!(prev_size, expected_prev, "previous-tag-size mismatch");
            warnings.push(format!(
                "previous-tag-size {prev_size} does not match tag of {expected_prev} bytes"
            ));
        }
        let tag_at = c.position();
        let tag_type = c.read_u8()? & 0x1F;
        let data_len = c.read_u24_be()? as u64;
        let ts_low = c.read_u24_be()?;
        let ts_ext = c.read_u8()? as u32;
        let _stream_id = c.read_u24_be()?;
        let timestamp = (ts_ext << 24) | ts_low;
        let data_start = c.position();
        c.ensure_within(data_start + data_len)?;
        trace!(tag_at, tag_type, data_len, timestamp, "tag");
        tags += 1;

        match tag_type {
            TAG_AUDIO if data_len > 0 => {
                let b = c.read_u8()?;
                raw.audio.get_or_insert(FlvAudio {
                    codec_id: b >> 4,
                    rate_index: (b >> 2) & 0x3,
                    sixteen_bit: b & 0x02 != 0,
                    stereo: b & 0x01 != 0,
                });
                raw.audio_bytes += data_len;
                raw.max_timestamp_ms = raw.max_timestamp_ms.max(timestamp);
            }
            TAG_VIDEO if data_len > 0 => {
                let b = c.read_u8()?;
                raw.video.get_or_insert(FlvVideo { codec_id: b & 0x0F });
                raw.video_frames += 1;
                raw.video_bytes += data_len;
                raw.max_timestamp_ms = raw.max_timestamp_ms.max(timestamp);
            }
            TAG_SCRIPT if data_len <= MAX_SCRIPT_TAG => {
                let data = c.read_bytes(data_len)?;
                match read_script(&data, ctx.max_depth) {
                    Ok(Some(meta)) => {
                        debug!(entries = meta.len(), "onMetaData");
                        for (k, v) in meta {
                            raw.meta.entry(k).or_insert(v);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warnings.push(format!("script tag at offset {tag_at}: {e}")),
                }
            }
            TAG_AUDIO | TAG_VIDEO | TAG_SCRIPT => {}
            other => warnings.push(format!("unknown FLV tag type {other} at offset {tag_at}")),
        }
        c.seek_to(data_start + data_len)?;
        expected_prev = (TAG_HEADER_LEN + data_len) as u32;
        // every tag is followed by its own size; a file cut here is truncated
        prev_size = c.read_u32_be()?;
    }
    debug!(tags, "FLV tags walked");
    if prev_size != expected_prev && tags > 0 {
        warnings.push(format!(
            "previous-tag-size {prev_size} does not match tag of {expected_prev} bytes"
        ));
    }
    Ok(())
}

/// Decodes a script tag. Returns the flattened `onMetaData` object, or
/// `None` for other script events.
fn read_script(data: &[u8], max_depth: u32) -> Result<Option<BTreeMap<String, f64>>> {
    let mut r = ParseCursor::from_slice(data);
    let name = match amf::read_value(&mut r, 0, max_depth)? {
        amf::Value::String(s) => s,
        _ => return Err(ParseError::malformed(0, "script tag does not start with a name")),
    };
    if name != "onMetaData" {
        return Ok(None);
    }
    let mut out = BTreeMap::new();
    if let amf::Value::Object(entries) = amf::read_value(&mut r, 0, max_depth)? {
        for (k, v) in entries {
            match v {
                amf::Value::Number(n) => {
                    out.insert(k, n);
                }
                amf::Value::Boolean(b) => {
                    out.insert(k, if b { 1.0 } else { 0.0 });
                }
                _ => {}
            }
        }
    }
    Ok(Some(out))
}

/// AMF0 value decoding, enough to read script data objects.
pub mod amf {
    use super::depth_exceeded;
    use crate::cursor::ParseCursor;
    use crate::error::{ParseError, Result};
    use std::io::{Read, Seek};

    const NUMBER: u8 = 0x00;
    const BOOLEAN: u8 = 0x01;
    const STRING: u8 = 0x02;
    const OBJECT: u8 = 0x03;
    const NULL: u8 = 0x05;
    const UNDEFINED: u8 = 0x06;
    const ECMA_ARRAY: u8 = 0x08;
    const OBJECT_END: u8 = 0x09;
    const STRICT_ARRAY: u8 = 0x0A;
    const DATE: u8 = 0x0B;
    const LONG_STRING: u8 = 0x0C;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Value {
        Number(f64),
        Boolean(bool),
        String(String),
        /// Objects and ECMA arrays, in file order.
        Object(Vec<(String, Value)>),
        Array(Vec<Value>),
        Date(f64),
        Null,
    }

    pub fn read_value<R: Read + Seek>(r: &mut ParseCursor<R>, depth: u32, max_depth: u32) -> Result<Value> {
        if depth > max_depth {
            return Err(depth_exceeded(r.position(), max_depth));
        }
        let at = r.position();
        Ok(match r.read_u8()? {
            NUMBER => Value::Number(r.read_f64_be()?),
            BOOLEAN => Value::Boolean(r.read_u8()? != 0),
            STRING => Value::String(read_short_string(r)?),
            LONG_STRING => {
                let n = r.read_u32_be()? as u64;
                Value::String(String::from_utf8_lossy(&r.read_bytes(n)?).into_owned())
            }
            OBJECT => Value::Object(read_properties(r, depth, max_depth)?),
            ECMA_ARRAY => {
                let _count = r.read_u32_be()?;
                Value::Object(read_properties(r, depth, max_depth)?)
            }
            STRICT_ARRAY => {
                let count = r.read_u32_be()?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(read_value(r, depth + 1, max_depth)?);
                }
                Value::Array(items)
            }
            DATE => {
                let ms = r.read_f64_be()?;
                let _tz = r.read_u16_be()?;
                Value::Date(ms)
            }
            NULL | UNDEFINED => Value::Null,
            other => return Err(ParseError::malformed(at, format!("unsupported AMF0 type 0x{other:02x}"))),
        })
    }

    fn read_short_string<R: Read + Seek>(r: &mut ParseCursor<R>) -> Result<String> {
        let n = r.read_u16_be()? as u64;
        Ok(String::from_utf8_lossy(&r.read_bytes(n)?).into_owned())
    }

    fn read_properties<R: Read + Seek>(
        r: &mut ParseCursor<R>,
        depth: u32,
        max_depth: u32,
    ) -> Result<Vec<(String, Value)>> {
        let mut props = Vec::new();
        loop {
            let key = read_short_string(r)?;
            if key.is_empty() {
                // some muxers omit the end marker at the end of the tag
                if r.is_at_end() {
                    break;
                }
                let marker_at = r.position();
                if r.read_u8()? != OBJECT_END {
                    return Err(ParseError::malformed(marker_at, "expected AMF0 object end"));
                }
                break;
            }
            let value = read_value(r, depth + 1, max_depth)?;
            props.push((key, value));
        }
        Ok(props)
    }
}
