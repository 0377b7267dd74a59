//! The canonical result of one analysis.

use serde::Serialize;
use std::collections::BTreeMap;

/// Container family label as it appears in serialized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Container {
    #[serde(rename = "RIFF-WAV")]
    RiffWav,
    #[serde(rename = "RIFF-AVI")]
    RiffAvi,
    #[serde(rename = "ISOBMFF")]
    IsoBmff,
    #[serde(rename = "OGG")]
    Ogg,
    #[serde(rename = "FLAC")]
    Flac,
    #[serde(rename = "EBML")]
    Ebml,
    #[serde(rename = "MPEG-ADTS")]
    MpegAdts,
    #[serde(rename = "FLV")]
    Flv,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamDescriptor {
    pub kind: StreamKind,
    /// Canonical codec name, or the container's raw identifier when unknown.
    pub codec: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u16>,

    pub bitrate_kbps: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl StreamDescriptor {
    pub fn new(kind: StreamKind, codec: impl Into<String>) -> Self {
        StreamDescriptor {
            kind,
            codec: codec.into(),
            width: None,
            height: None,
            fps: None,
            frame_count: None,
            channels: None,
            sample_rate: None,
            bit_depth: None,
            bitrate_kbps: 0,
            language: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKey {
    Title,
    Artist,
    Album,
    Year,
    Genre,
    Track,
    Comment,
}

/// Canonical tags. Empty values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<TagKey, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: TagKey, value: impl AsRef<str>) {
        let v = value.as_ref().trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if !v.is_empty() {
            self.0.insert(key, v.to_string());
        }
    }

    /// Stores `value` only when `key` is not already present.
    pub fn set_if_absent(&mut self, key: TagKey, value: impl AsRef<str>) {
        if !self.0.contains_key(&key) {
            self.set(key, value);
        }
    }

    /// Fills keys missing here from `other`.
    pub fn merge_missing(&mut self, other: &TagSet) {
        for (k, v) in &other.0 {
            self.set_if_absent(*k, v);
        }
    }

    pub fn get(&self, key: TagKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Everything learned about one file. Built once by the normalizer and
/// handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRecord {
    pub container: Container,
    /// Specific format label, e.g. `"MP4"` or `"WebM"`.
    pub format: String,
    pub duration_seconds: f64,
    pub bitrate_kbps: u32,
    pub streams: Vec<StreamDescriptor>,
    pub tags: TagSet,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub success: bool,
}

impl MediaRecord {
    /// A record for a file that could not be read at all.
    pub fn failed(container: Container, format: &str, error: impl Into<String>) -> Self {
        MediaRecord {
            container,
            format: format.to_string(),
            duration_seconds: 0.0,
            bitrate_kbps: 0,
            streams: Vec::new(),
            tags: TagSet::new(),
            warnings: Vec::new(),
            errors: vec![error.into()],
            success: false,
        }
    }

    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter().filter(move |s| s.kind == kind)
    }
}
