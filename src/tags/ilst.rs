//! iTunes-style `ilst` items inside `moov/udta/meta`.
//!
//! Each item atom holds a `data` atom: `u32 size, "data", u32 type, u32 locale, value`.

use super::{decode_utf8, genre_name, normalize_year, resolve_genre};
use crate::record::TagKey;

/// Well-known data type for UTF-8 text.
const TYPE_UTF8: u32 = 1;

fn item_key(code: &[u8; 4]) -> Option<TagKey> {
    Some(match code {
        b"\xA9nam" => TagKey::Title,
        b"\xA9ART" => TagKey::Artist,
        b"\xA9alb" => TagKey::Album,
        b"\xA9day" => TagKey::Year,
        b"\xA9gen" | b"gnre" => TagKey::Genre,
        b"trkn" => TagKey::Track,
        b"\xA9cmt" => TagKey::Comment,
        _ => return None,
    })
}

/// True for item codes this decoder maps; other items (cover art etc.) can
/// be skipped without reading their payload.
pub fn is_mapped(code: &[u8; 4]) -> bool {
    item_key(code).is_some()
}

/// Decodes one item's payload (the bytes after the item atom header).
pub fn decode_item(code: &[u8; 4], payload: &[u8]) -> Option<(TagKey, String)> {
    let key = item_key(code)?;
    let value = data_value(payload)?;
    let text = match code {
        b"trkn" => {
            // reserved(2) track(2) total(2)
            let track = u16::from_be_bytes([*value.get(2)?, *value.get(3)?]);
            if track == 0 {
                return None;
            }
            track.to_string()
        }
        b"gnre" => {
            // ID3v1 index plus one
            let idx = u16::from_be_bytes([*value.first()?, *value.get(1)?]);
            let idx = u8::try_from(idx.checked_sub(1)?).ok()?;
            genre_name(idx)?.to_string()
        }
        b"\xA9day" => normalize_year(&decode_utf8(value))?,
        b"\xA9gen" => resolve_genre(&decode_utf8(value)),
        _ => decode_utf8(value),
    };
    Some((key, text))
}

fn data_value(payload: &[u8]) -> Option<&[u8]> {
    let size = u32::from_be_bytes(payload.get(0..4)?.try_into().ok()?) as usize;
    if payload.get(4..8)? != b"data" || size < 16 {
        return None;
    }
    let type_field = u32::from_be_bytes(payload.get(8..12)?.try_into().ok()?) & 0x00FF_FFFF;
    let value = payload.get(16..size.min(payload.len()))?;
    if type_field != TYPE_UTF8 && type_field != 0 && type_field != 21 {
        tracing::trace!(type_field, "ilst data of unexpected type");
    }
    Some(value)
}
