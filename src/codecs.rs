//! Static codec identifier tables.
//!
//! Each container names codecs in its own vocabulary (RIFF FourCCs, WAVE
//! format tags, ISO sample entry types, Matroska codec IDs, FLV nibbles).
//! Lookups return `None` for unknown identifiers; callers surface the raw
//! identifier instead.

use crate::record::StreamKind;

/// AVI `strh`/`strf` video FourCCs.
static AVI_VIDEO_FOURCC: &[(&str, &str)] = &[
    ("H264", "H.264/AVC"),
    ("h264", "H.264/AVC"),
    ("avc1", "H.264/AVC"),
    ("AVC1", "H.264/AVC"),
    ("X264", "H.264/AVC"),
    ("x264", "H.264/AVC"),
    ("XVID", "Xvid"),
    ("xvid", "Xvid"),
    ("DIVX", "DivX"),
    ("divx", "DivX"),
    ("DX50", "DivX 5"),
    ("DIV3", "DivX 3"),
    ("FMP4", "MPEG-4"),
    ("MP4V", "MPEG-4"),
    ("MJPG", "Motion JPEG"),
    ("mjpg", "Motion JPEG"),
    ("VP80", "VP8"),
    ("VP90", "VP9"),
    ("HEVC", "H.265/HEVC"),
    ("hevc", "H.265/HEVC"),
    ("H265", "H.265/HEVC"),
    ("AV01", "AV1"),
    ("WMV3", "WMV9"),
    ("MP42", "MS-MPEG4 v2"),
];

/// WAVEFORMATEX format tags.
static WAVE_FORMAT_TAGS: &[(u16, &str)] = &[
    (0x0001, "PCM"),
    (0x0002, "MS ADPCM"),
    (0x0003, "IEEE Float"),
    (0x0006, "A-Law"),
    (0x0007, "mu-Law"),
    (0x0011, "IMA ADPCM"),
    (0x0050, "MP2"),
    (0x0055, "MP3"),
    (0x00FF, "AAC"),
    (0x0161, "WMA"),
    (0x2000, "AC-3"),
    (0x2001, "DTS"),
    (0xF1AC, "FLAC"),
];

/// `WAVE_FORMAT_EXTENSIBLE`; the real format sits in the sub-format GUID.
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// ISO-BMFF sample entry types with the stream kind they imply.
static ISO_SAMPLE_ENTRIES: &[(&str, &str, StreamKind)] = &[
    ("avc1", "H.264/AVC", StreamKind::Video),
    ("avc3", "H.264/AVC", StreamKind::Video),
    ("hvc1", "H.265/HEVC", StreamKind::Video),
    ("hev1", "H.265/HEVC", StreamKind::Video),
    ("vp08", "VP8", StreamKind::Video),
    ("vp09", "VP9", StreamKind::Video),
    ("av01", "AV1", StreamKind::Video),
    ("mp4v", "MPEG-4", StreamKind::Video),
    ("mjpg", "Motion JPEG", StreamKind::Video),
    ("jpeg", "JPEG", StreamKind::Video),
    ("apcn", "ProRes 422", StreamKind::Video),
    ("apch", "ProRes 422 HQ", StreamKind::Video),
    ("mp4a", "AAC", StreamKind::Audio),
    ("ac-3", "AC-3", StreamKind::Audio),
    ("ec-3", "E-AC-3", StreamKind::Audio),
    ("Opus", "Opus", StreamKind::Audio),
    ("opus", "Opus", StreamKind::Audio),
    ("fLaC", "FLAC", StreamKind::Audio),
    ("alac", "Apple Lossless", StreamKind::Audio),
    ("alaw", "A-Law", StreamKind::Audio),
    ("ulaw", "mu-Law", StreamKind::Audio),
    ("lpcm", "PCM", StreamKind::Audio),
    ("sowt", "PCM", StreamKind::Audio),
    ("twos", "PCM", StreamKind::Audio),
    (".mp3", "MP3", StreamKind::Audio),
    ("tx3g", "Timed Text", StreamKind::Subtitle),
    ("wvtt", "WebVTT", StreamKind::Subtitle),
    ("stpp", "TTML", StreamKind::Subtitle),
    ("c608", "CEA-608", StreamKind::Subtitle),
];

/// Matroska `CodecID` strings.
static MATROSKA_CODEC_IDS: &[(&str, &str)] = &[
    ("V_MPEG4/ISO/AVC", "H.264/AVC"),
    ("V_MPEGH/ISO/HEVC", "H.265/HEVC"),
    ("V_VP8", "VP8"),
    ("V_VP9", "VP9"),
    ("V_AV1", "AV1"),
    ("V_MPEG4/ISO/SP", "MPEG-4 SP"),
    ("V_MPEG4/ISO/AP", "MPEG-4 AP"),
    ("V_MPEG4/ISO/ASP", "MPEG-4 ASP"),
    ("V_MPEG2", "MPEG-2"),
    ("V_THEORA", "Theora"),
    ("V_MJPEG", "Motion JPEG"),
    ("A_AAC", "AAC"),
    ("A_AAC/MPEG4/LC", "AAC-LC"),
    ("A_AAC/MPEG2/LC", "AAC-LC"),
    ("A_AC3", "AC-3"),
    ("A_EAC3", "E-AC-3"),
    ("A_DTS", "DTS"),
    ("A_FLAC", "FLAC"),
    ("A_OPUS", "Opus"),
    ("A_VORBIS", "Vorbis"),
    ("A_MPEG/L3", "MP3"),
    ("A_MPEG/L2", "MP2"),
    ("A_PCM/INT/LIT", "PCM"),
    ("A_PCM/INT/BIG", "PCM"),
    ("A_TRUEHD", "TrueHD"),
    ("S_TEXT/UTF8", "SRT"),
    ("S_TEXT/ASS", "ASS/SSA"),
    ("S_TEXT/SSA", "ASS/SSA"),
    ("S_TEXT/WEBVTT", "WebVTT"),
    ("S_VOBSUB", "VobSub"),
    ("S_HDMV/PGS", "PGS"),
];

/// FLV audio `SoundFormat` nibble.
static FLV_AUDIO_CODECS: &[(u8, &str)] = &[
    (0, "PCM"),
    (1, "ADPCM"),
    (2, "MP3"),
    (3, "PCM"),
    (4, "Nellymoser"),
    (5, "Nellymoser"),
    (6, "Nellymoser"),
    (7, "G.711 A-Law"),
    (8, "G.711 mu-Law"),
    (10, "AAC"),
    (11, "Speex"),
    (14, "MP3"),
];

/// FLV video `CodecID` nibble.
static FLV_VIDEO_CODECS: &[(u8, &str)] = &[
    (2, "Sorenson H.263"),
    (3, "Screen Video"),
    (4, "VP6"),
    (5, "VP6 Alpha"),
    (6, "Screen Video v2"),
    (7, "H.264/AVC"),
    (12, "H.265/HEVC"),
];

/// FLV `SoundRate` index.
pub static FLV_SAMPLE_RATES: [u32; 4] = [5512, 11025, 22050, 44100];

pub fn avi_video_codec(fourcc: &str) -> Option<&'static str> {
    lookup(AVI_VIDEO_FOURCC, fourcc)
}

pub fn wave_format(tag: u16) -> Option<&'static str> {
    WAVE_FORMAT_TAGS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, name)| *name)
}

pub fn iso_sample_entry(fourcc: &str) -> Option<(&'static str, StreamKind)> {
    ISO_SAMPLE_ENTRIES
        .iter()
        .find(|(code, _, _)| *code == fourcc)
        .map(|(_, name, kind)| (*name, *kind))
}

/// Matroska codec IDs match exactly first, then by longest registered prefix
/// so that `A_AAC/MPEG4/LC/SBR` still resolves to an AAC family name.
pub fn matroska_codec(codec_id: &str) -> Option<&'static str> {
    lookup(MATROSKA_CODEC_IDS, codec_id).or_else(|| {
        MATROSKA_CODEC_IDS
            .iter()
            .filter(|(id, _)| codec_id.starts_with(&format!("{id}/")))
            .max_by_key(|(id, _)| id.len())
            .map(|(_, name)| *name)
    })
}

pub fn flv_audio_codec(id: u8) -> Option<&'static str> {
    FLV_AUDIO_CODECS
        .iter()
        .find(|(c, _)| *c == id)
        .map(|(_, name)| *name)
}

pub fn flv_video_codec(id: u8) -> Option<&'static str> {
    FLV_VIDEO_CODECS
        .iter()
        .find(|(c, _)| *c == id)
        .map(|(_, name)| *name)
}

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}
