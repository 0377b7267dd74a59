//! Tag decoders shared between container readers.

pub mod id3v1;
pub mod id3v2;
pub mod ilst;
pub mod riff_info;
pub mod vorbis;

use encoding_rs::{UTF_8, WINDOWS_1252};

/// ID3v1 genre list (the original 80 entries plus the Winamp extensions in
/// common use).
static GENRES: &[&str] = &[
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop", "Jazz",
    "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap", "Reggae", "Rock", "Techno",
    "Industrial", "Alternative", "Ska", "Death Metal", "Pranks", "Soundtrack", "Euro-Techno",
    "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical", "Instrumental",
    "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise", "AlternRock", "Bass", "Soul",
    "Punk", "Space", "Meditative", "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic",
    "Darkwave", "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap", "Pop/Funk",
    "Jungle", "Native American", "Cabaret", "New Wave", "Psychedelic", "Rave", "Showtunes",
    "Trailer", "Lo-Fi", "Tribal", "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical",
    "Rock & Roll", "Hard Rock", "Folk", "Folk-Rock", "National Folk", "Swing", "Fast Fusion",
    "Bebop", "Latin", "Revival", "Celtic", "Bluegrass", "Avantgarde", "Gothic Rock",
    "Progressive Rock", "Psychedelic Rock", "Symphonic Rock", "Slow Rock", "Big Band",
    "Chorus", "Easy Listening", "Acoustic", "Humour", "Speech", "Chanson", "Opera",
    "Chamber Music", "Sonata", "Symphony", "Booty Bass", "Primus", "Porn Groove", "Satire",
    "Slow Jam", "Club", "Tango", "Samba", "Folklore", "Ballad", "Power Ballad",
    "Rhythmic Soul", "Freestyle", "Duet", "Punk Rock", "Drum Solo", "A capella", "Euro-House",
    "Dance Hall",
];

pub fn genre_name(index: u8) -> Option<&'static str> {
    GENRES.get(index as usize).copied()
}

/// Resolves ID3-style genre strings: `"17"`, `"(17)"`, `"(17)Rock"`.
/// Free text after a numeric reference wins over the reference.
pub fn resolve_genre(raw: &str) -> String {
    let s = raw.trim();
    if let Some(rest) = s.strip_prefix('(') {
        if let Some(close) = rest.find(')') {
            let (num, tail) = (&rest[..close], rest[close + 1..].trim());
            if !tail.is_empty() {
                return tail.to_string();
            }
            if let Some(name) = num.parse::<u8>().ok().and_then(genre_name) {
                return name.to_string();
            }
        }
    }
    if let Some(name) = s.parse::<u8>().ok().and_then(genre_name) {
        return name.to_string();
    }
    s.to_string()
}

/// Reduces a date string to its leading four-digit year.
pub fn normalize_year(raw: &str) -> Option<String> {
    let s = raw.trim();
    let year: String = s.chars().take(4).collect();
    if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) {
        Some(year)
    } else {
        None
    }
}

/// Decodes a 4-byte syncsafe integer (7 bits per byte). Returns `None` if any
/// byte has its high bit set.
pub fn syncsafe(b: &[u8]) -> Option<u32> {
    if b.len() < 4 || b[..4].iter().any(|&x| x & 0x80 != 0) {
        return None;
    }
    Some(b[..4].iter().fold(0u32, |acc, &x| (acc << 7) | x as u32))
}

/// Text that is usually ASCII but may be UTF-8 or Latin-1.
pub fn decode_legacy_text(raw: &[u8]) -> String {
    let raw = trim_nul(raw);
    match std::str::from_utf8(raw) {
        Ok(s) => s.to_string(),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(raw).0.into_owned(),
    }
}

pub fn decode_utf8(raw: &[u8]) -> String {
    UTF_8.decode_without_bom_handling(trim_nul(raw)).0.into_owned()
}

/// Cuts at the first NUL.
pub fn trim_nul(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|&b| b == 0) {
        Some(i) => &raw[..i],
        None => raw,
    }
}
