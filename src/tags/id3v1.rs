//! ID3v1 / ID3v1.1 trailer: 128 fixed-layout bytes at the end of the file.

use super::{decode_legacy_text, genre_name};
use crate::record::{TagKey, TagSet};

pub const TRAILER_LEN: u64 = 128;

/// Decodes a trailer. Returns `None` when the block does not start with `TAG`.
pub fn decode(block: &[u8]) -> Option<TagSet> {
    if block.len() < TRAILER_LEN as usize || !block.starts_with(b"TAG") {
        return None;
    }
    let mut tags = TagSet::new();
    tags.set(TagKey::Title, decode_legacy_text(&block[3..33]));
    tags.set(TagKey::Artist, decode_legacy_text(&block[33..63]));
    tags.set(TagKey::Album, decode_legacy_text(&block[63..93]));
    if let Some(y) = super::normalize_year(&decode_legacy_text(&block[93..97])) {
        tags.set(TagKey::Year, y);
    }

    let comment = &block[97..127];
    // v1.1: a zero byte at 28 followed by a non-zero track number
    if comment[28] == 0 && comment[29] != 0 {
        tags.set(TagKey::Comment, decode_legacy_text(&comment[..28]));
        tags.set(TagKey::Track, comment[29].to_string());
    } else {
        tags.set(TagKey::Comment, decode_legacy_text(comment));
    }

    if let Some(g) = genre_name(block[127]) {
        tags.set(TagKey::Genre, g);
    }
    Some(tags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(s: &str, len: usize) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.resize(len, 0);
        v
    }

    #[test]
    fn v11_with_track() {
        let mut b = b"TAG".to_vec();
        b.extend(field("Title", 30));
        b.extend(field("Artist", 30));
        b.extend(field("Album", 30));
        b.extend(field("1997", 4));
        let mut comment = field("nice", 30);
        comment[29] = 7;
        b.extend(comment);
        b.push(13);

        let tags = decode(&b).unwrap();
        assert_eq!(tags.get(TagKey::Title), Some("Title"));
        assert_eq!(tags.get(TagKey::Year), Some("1997"));
        assert_eq!(tags.get(TagKey::Track), Some("7"));
        assert_eq!(tags.get(TagKey::Comment), Some("nice"));
        assert_eq!(tags.get(TagKey::Genre), Some("Pop"));
    }

    #[test]
    fn genre_255_means_none() {
        let mut b = b"TAG".to_vec();
        b.resize(127, b' ');
        b.push(255);
        let tags = decode(&b).unwrap();
        assert!(tags.get(TagKey::Genre).is_none());
        assert!(tags.is_empty());
    }

    #[test]
    fn not_a_trailer() {
        assert!(decode(&[0u8; 128]).is_none());
    }
}
