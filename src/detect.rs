//! Format detection from file extension and leading bytes.

use crate::record::Container;
use crate::vint::{decode_element_id, decode_element_size};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Bytes read from the front of a file for magic sniffing.
pub const HEAD_LEN: u64 = 64 * 1024;

/// Reader family. One reader function exists per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFamily {
    Riff,
    IsoBmff,
    Ogg,
    Flac,
    Ebml,
    Mpeg,
    Flv,
    Unknown,
}

/// Specific format within a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaFormat {
    Wav,
    Avi,
    Mp4,
    Mov,
    M4a,
    /// Raw ADTS AAC stream.
    Aac,
    Ogg,
    Flac,
    Matroska,
    WebM,
    Mp3,
    Flv,
    Unknown,
}

impl MediaFormat {
    pub fn family(self) -> ContainerFamily {
        use MediaFormat::*;
        match self {
            Wav | Avi => ContainerFamily::Riff,
            Mp4 | Mov | M4a => ContainerFamily::IsoBmff,
            Ogg => ContainerFamily::Ogg,
            Flac => ContainerFamily::Flac,
            Matroska | WebM => ContainerFamily::Ebml,
            Mp3 | Aac => ContainerFamily::Mpeg,
            Flv => ContainerFamily::Flv,
            Unknown => ContainerFamily::Unknown,
        }
    }

    pub fn container(self) -> Container {
        use MediaFormat::*;
        match self {
            Wav => Container::RiffWav,
            Avi => Container::RiffAvi,
            Mp4 | Mov | M4a => Container::IsoBmff,
            Ogg => Container::Ogg,
            Flac => Container::Flac,
            Matroska | WebM => Container::Ebml,
            Mp3 | Aac => Container::MpegAdts,
            Flv => Container::Flv,
            Unknown => Container::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        use MediaFormat::*;
        match self {
            Wav => "WAV",
            Avi => "AVI",
            Mp4 => "MP4",
            Mov => "MOV",
            M4a => "M4A",
            Aac => "AAC",
            Ogg => "OGG",
            Flac => "FLAC",
            Matroska => "MKV",
            WebM => "WebM",
            Mp3 => "MP3",
            Flv => "FLV",
            Unknown => "unknown",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        use MediaFormat::*;
        let f = match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Wav,
            "avi" => Avi,
            "mp4" | "m4v" | "3gp" => Mp4,
            "mov" | "qt" => Mov,
            "m4a" | "m4b" | "m4p" => M4a,
            "aac" => Aac,
            "ogg" | "oga" | "opus" => Ogg,
            "flac" => Flac,
            "mkv" | "mka" | "mks" => Matroska,
            "webm" => WebM,
            "mp3" => Mp3,
            "flv" => Flv,
            _ => return None,
        };
        Some(f)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    /// Accepts the labels produced by [`MediaFormat::label`] as well as
    /// common file extensions, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unknown") {
            return Ok(MediaFormat::Unknown);
        }
        MediaFormat::from_extension(s)
            .or_else(|| match s.to_ascii_lowercase().as_str() {
                "matroska" => Some(MediaFormat::Matroska),
                _ => None,
            })
            .ok_or_else(|| format!("unrecognized format '{s}'"))
    }
}

/// Outcome of detection plus anything worth reporting about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub format: MediaFormat,
    pub warnings: Vec<String>,
}

/// Picks a format from the file name and the first bytes of the file.
///
/// The extension wins when the content agrees with it or gives no opinion.
/// When the content clearly belongs to another family the content wins and a
/// warning is recorded. Never fails; `MediaFormat::Unknown` means no reader
/// claims the file.
pub fn detect(file_name: &str, head: &[u8]) -> Detection {
    let by_ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(MediaFormat::from_extension);
    let by_magic = sniff(head);

    let format = match (by_ext, by_magic) {
        (None, m) => m,
        (Some(e), MediaFormat::Unknown) => e,
        (Some(e), m) if e.family() == m.family() => refine(e, m),
        // .aac files are frequently MP4 audio
        (Some(MediaFormat::Aac), m) if m.family() == ContainerFamily::IsoBmff => MediaFormat::M4a,
        (Some(e), m) => {
            let msg = format!(
                "extension suggests {} but content looks like {}; using {}",
                e.label(),
                m.label(),
                m.label()
            );
            tracing::warn!("{msg}");
            return Detection {
                format: m,
                warnings: vec![msg],
            };
        }
    };
    tracing::debug!(?by_ext, ?by_magic, ?format, "detected format");
    Detection {
        format,
        warnings: Vec::new(),
    }
}

/// Within one family the extension chooses the label, except where the
/// content proves a different reader path is needed.
fn refine(by_ext: MediaFormat, by_magic: MediaFormat) -> MediaFormat {
    match (by_ext, by_magic) {
        (MediaFormat::Mp3, MediaFormat::Aac) | (MediaFormat::Aac, MediaFormat::Mp3) => by_magic,
        _ => by_ext,
    }
}

/// Identifies a format from magic bytes alone.
pub fn sniff(head: &[u8]) -> MediaFormat {
    if head.len() >= 12 && &head[0..4] == b"RIFF" {
        match &head[8..12] {
            b"WAVE" => return MediaFormat::Wav,
            b"AVI " => return MediaFormat::Avi,
            _ => {}
        }
    }
    if let Some(f) = sniff_iso(head) {
        return f;
    }
    if head.starts_with(b"OggS") {
        return MediaFormat::Ogg;
    }
    if head.starts_with(b"fLaC") {
        return MediaFormat::Flac;
    }
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return match ebml_doc_type(head).as_deref() {
            Some("webm") => MediaFormat::WebM,
            _ => MediaFormat::Matroska,
        };
    }
    if head.starts_with(b"ID3") {
        if let Some(tag_len) = id3_tag_len(head) {
            let after = head.get(tag_len..tag_len + 4);
            if after == Some(b"fLaC".as_slice()) {
                return MediaFormat::Flac;
            }
        }
        return MediaFormat::Mp3;
    }
    if head.len() >= 2 && head[0] == 0xFF && head[1] & 0xE0 == 0xE0 {
        // layer bits 00 are reserved for MPEG audio and used by ADTS
        return if head[1] & 0x06 == 0 {
            MediaFormat::Aac
        } else {
            MediaFormat::Mp3
        };
    }
    if head.starts_with(b"FLV") {
        return MediaFormat::Flv;
    }
    MediaFormat::Unknown
}

fn sniff_iso(head: &[u8]) -> Option<MediaFormat> {
    let typ = head.get(4..8)?;
    match typ {
        b"ftyp" => {
            let brand = head.get(8..12)?;
            Some(match brand {
                b"qt  " => MediaFormat::Mov,
                b"M4A " | b"M4B " | b"M4P " => MediaFormat::M4a,
                _ => MediaFormat::Mp4,
            })
        }
        b"moov" | b"mdat" | b"free" | b"skip" | b"wide" | b"pnot" => Some(MediaFormat::Mp4),
        _ => None,
    }
}

/// Total length of an ID3v2 tag including header and optional footer.
pub fn id3_tag_len(head: &[u8]) -> Option<usize> {
    if head.len() < 10 || !head.starts_with(b"ID3") {
        return None;
    }
    let size = crate::tags::syncsafe(&head[6..10])? as usize;
    let footer = if head[3] == 4 && head[5] & 0x10 != 0 { 10 } else { 0 };
    Some(10 + size + footer)
}

/// DocType string from an EBML header, if present in `head`.
fn ebml_doc_type(head: &[u8]) -> Option<String> {
    let (_, id_len) = decode_element_id(head)?;
    let (header_size, size_len) = decode_element_size(&head[id_len..])?;
    let start = id_len + size_len;
    let end = start.saturating_add(usize::try_from(header_size).ok()?).min(head.len());
    let mut pos = start;
    while pos < end {
        let (id, il) = decode_element_id(&head[pos..end])?;
        let (size, sl) = decode_element_size(&head[pos + il..end])?;
        let body = pos + il + sl;
        let body_end = body.checked_add(usize::try_from(size).ok()?)?;
        if body_end > end {
            return None;
        }
        if id == 0x4282 {
            let raw = &head[body..body_end];
            let text: String = raw
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| b as char)
                .collect();
            return Some(text);
        }
        pos = body_end;
    }
    None
}
