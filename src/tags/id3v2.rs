//! ID3v2.2 / 2.3 / 2.4 tags.

use super::{normalize_year, resolve_genre, syncsafe};
use crate::cursor::ParseCursor;
use crate::error::{ParseError, Result};
use crate::record::{TagKey, TagSet};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use std::io::{Read, Seek};

const FLAG_UNSYNC: u8 = 0x80;
const FLAG_EXTENDED: u8 = 0x40;
const FLAG_FOOTER: u8 = 0x10;

#[derive(Debug, Clone, PartialEq)]
pub struct Id3v2Tag {
    pub major_version: u8,
    /// Bytes occupied by the tag including header and footer.
    pub total_len: u64,
    pub tags: TagSet,
    pub warnings: Vec<String>,
}

/// Reads a tag at the cursor position. Returns `Ok(None)` and leaves the
/// cursor untouched when no `ID3` header is there; otherwise the cursor ends
/// just past the tag.
pub fn read_tag<R: Read + Seek>(c: &mut ParseCursor<R>) -> Result<Option<Id3v2Tag>> {
    let start = c.position();
    let peek = c.peek_bytes(10)?;
    if !peek.starts_with(b"ID3") {
        return Ok(None);
    }
    let header: [u8; 10] = c.read_array()?;
    let major = header[3];
    let flags = header[5];
    let size = syncsafe(&header[6..10])
        .ok_or_else(|| ParseError::malformed(start + 6, "ID3v2 size is not syncsafe"))?
        as u64;
    if !(2..=4).contains(&major) {
        return Err(ParseError::malformed(
            start + 3,
            format!("unsupported ID3v2 version 2.{major}"),
        ));
    }
    let footer = if major == 4 && flags & FLAG_FOOTER != 0 { 10 } else { 0 };
    let total_len = 10 + size + footer;
    c.ensure_within(start + total_len)?;

    let mut body = c.read_bytes(size)?;
    c.skip(footer)?;
    if flags & FLAG_UNSYNC != 0 && major < 4 {
        body = remove_unsync(&body);
    }

    let mut warnings = Vec::new();
    let frames_start = if flags & FLAG_EXTENDED != 0 && major >= 3 {
        extended_header_len(&body, major).unwrap_or_else(|| {
            warnings.push("ID3v2 extended header is unreadable".to_string());
            body.len()
        })
    } else {
        0
    };

    let mut tags = TagSet::new();
    let frames = body.get(frames_start..).unwrap_or_default();
    walk_frames(frames, major, &mut tags, &mut warnings);
    tracing::debug!(major, size, tags = tags.len(), "read ID3v2 tag");

    Ok(Some(Id3v2Tag {
        major_version: major,
        total_len,
        tags,
        warnings,
    }))
}

fn extended_header_len(body: &[u8], major: u8) -> Option<usize> {
    let raw = body.get(0..4)?;
    let len = if major == 4 {
        syncsafe(raw)? as usize
    } else {
        u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize + 4
    };
    (len <= body.len()).then_some(len)
}

fn remove_unsync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.push(data[i]);
        if data[i] == 0xFF && data.get(i + 1) == Some(&0x00) {
            i += 1;
        }
        i += 1;
    }
    out
}

fn walk_frames(data: &[u8], major: u8, tags: &mut TagSet, warnings: &mut Vec<String>) {
    let (id_len, header_len) = if major == 2 { (3, 6) } else { (4, 10) };
    let mut pos = 0usize;
    while pos + header_len <= data.len() {
        let hdr = &data[pos..pos + header_len];
        if hdr[0] == 0 {
            break; // padding
        }
        let id = &hdr[..id_len];
        if !id.iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
            warnings.push(format!("ID3v2 frame id is invalid at tag offset {pos}"));
            break;
        }
        let size = match major {
            2 => u32::from_be_bytes([0, hdr[3], hdr[4], hdr[5]]) as usize,
            3 => u32::from_be_bytes([hdr[4], hdr[5], hdr[6], hdr[7]]) as usize,
            _ => match syncsafe(&hdr[4..8]) {
                Some(s) => s as usize,
                None => {
                    warnings.push(format!("ID3v2 frame size is not syncsafe at tag offset {pos}"));
                    break;
                }
            },
        };
        let body_start = pos + header_len;
        let Some(body) = data.get(body_start..body_start + size) else {
            warnings.push(format!(
                "ID3v2 frame {} overruns the tag",
                String::from_utf8_lossy(id)
            ));
            break;
        };
        apply_frame(id, body, tags);
        pos = body_start + size;
    }
}

fn frame_key(id: &[u8]) -> Option<TagKey> {
    Some(match id {
        b"TIT2" | b"TT2" => TagKey::Title,
        b"TPE1" | b"TP1" => TagKey::Artist,
        b"TALB" | b"TAL" => TagKey::Album,
        b"TYER" | b"TDRC" | b"TYE" => TagKey::Year,
        b"TCON" | b"TCO" => TagKey::Genre,
        b"TRCK" | b"TRK" => TagKey::Track,
        b"COMM" | b"COM" => TagKey::Comment,
        _ => return None,
    })
}

fn apply_frame(id: &[u8], body: &[u8], tags: &mut TagSet) {
    let Some(key) = frame_key(id) else { return };
    let Some((&enc, rest)) = body.split_first() else { return };
    let text = match key {
        TagKey::Comment => {
            // language(3) + description + text
            let Some(after_lang) = rest.get(3..) else { return };
            let (_, value) = split_terminated(enc, after_lang);
            decode_text(enc, value)
        }
        _ => {
            // v2.4 allows several NUL separated values; keep the first
            let (first, _) = split_terminated(enc, rest);
            decode_text(enc, first)
        }
    };
    match key {
        TagKey::Year => {
            if let Some(y) = normalize_year(&text) {
                tags.set_if_absent(key, y);
            }
        }
        TagKey::Genre => tags.set_if_absent(key, resolve_genre(&text)),
        _ => tags.set_if_absent(key, text),
    }
}

/// Splits at the encoding's string terminator, returning the string and what
/// follows it.
fn split_terminated(enc: u8, data: &[u8]) -> (&[u8], &[u8]) {
    if enc == 1 || enc == 2 {
        let mut i = 0;
        while i + 1 < data.len() {
            if data[i] == 0 && data[i + 1] == 0 {
                return (&data[..i], &data[i + 2..]);
            }
            i += 2;
        }
    } else if let Some(i) = data.iter().position(|&b| b == 0) {
        return (&data[..i], &data[i + 1..]);
    }
    (data, &[])
}

fn decode_text(enc: u8, data: &[u8]) -> String {
    let (encoding, body): (&'static Encoding, &[u8]) = match enc {
        0 => (WINDOWS_1252, data),
        1 => match data {
            [0xFF, 0xFE, rest @ ..] => (UTF_16LE, rest),
            [0xFE, 0xFF, rest @ ..] => (UTF_16BE, rest),
            _ => (UTF_16LE, data),
        },
        2 => (UTF_16BE, data),
        _ => (UTF_8, data),
    };
    let (text, _) = encoding.decode_without_bom_handling(body);
    text.trim_end_matches('\0').to_string()
}
