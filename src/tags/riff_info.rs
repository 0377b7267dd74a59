//! RIFF `LIST/INFO` sub-chunks (WAV and AVI).

use super::{decode_legacy_text, normalize_year};
use crate::record::{TagKey, TagSet};

fn info_key(id: &[u8; 4]) -> Option<TagKey> {
    Some(match id {
        b"INAM" => TagKey::Title,
        b"IART" => TagKey::Artist,
        b"IPRD" => TagKey::Album,
        b"ICRD" => TagKey::Year,
        b"IGNR" => TagKey::Genre,
        b"ICMT" => TagKey::Comment,
        b"ITRK" | b"IPRT" => TagKey::Track,
        _ => return None,
    })
}

/// Applies one INFO sub-chunk to `tags`. Unknown identifiers are ignored.
pub fn apply(id: &[u8; 4], payload: &[u8], tags: &mut TagSet) {
    let Some(key) = info_key(id) else { return };
    let text = decode_legacy_text(payload);
    match key {
        TagKey::Year => {
            if let Some(y) = normalize_year(&text) {
                tags.set_if_absent(key, y);
            }
        }
        _ => tags.set_if_absent(key, text),
    }
}
