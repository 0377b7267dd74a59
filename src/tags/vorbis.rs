//! Vorbis comment block, shared by Ogg (Vorbis and Opus) and FLAC.
//!
//! Layout: `u32le vendor_len, vendor, u32le count, count * (u32le len, "KEY=value")`.

use super::{decode_utf8, normalize_year};
use crate::cursor::ParseCursor;
use crate::error::Result;
use crate::record::{TagKey, TagSet};

#[derive(Debug, Clone, PartialEq)]
pub struct VorbisComments {
    pub vendor: String,
    pub tags: TagSet,
    /// Number of comment fields declared by the block.
    pub field_count: u32,
}

pub fn decode(data: &[u8]) -> Result<VorbisComments> {
    let mut c = ParseCursor::from_slice(data);
    let vendor_len = c.read_u32_le()? as u64;
    let vendor = decode_utf8(&c.read_bytes(vendor_len)?);
    let field_count = c.read_u32_le()?;

    let mut tags = TagSet::new();
    for _ in 0..field_count {
        let len = c.read_u32_le()? as u64;
        let raw = c.read_bytes(len)?;
        let field = decode_utf8(&raw);
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        apply_field(&key.to_ascii_uppercase(), value, &mut tags);
    }
    Ok(VorbisComments {
        vendor,
        tags,
        field_count,
    })
}

fn apply_field(key: &str, value: &str, tags: &mut TagSet) {
    match key {
        "TITLE" => tags.set_if_absent(TagKey::Title, value),
        "ARTIST" => tags.set_if_absent(TagKey::Artist, value),
        "ALBUM" => tags.set_if_absent(TagKey::Album, value),
        "DATE" | "YEAR" => {
            if let Some(y) = normalize_year(value) {
                tags.set_if_absent(TagKey::Year, y);
            }
        }
        "GENRE" => tags.set_if_absent(TagKey::Genre, value),
        "TRACKNUMBER" => tags.set_if_absent(TagKey::Track, value),
        "COMMENT" | "DESCRIPTION" => tags.set_if_absent(TagKey::Comment, value),
        _ => {}
    }
}
