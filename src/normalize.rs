//! Raw reader output to [`MediaRecord`].
//!
//! Everything here is a pure function of the reader's output, the detected
//! format and the file size. No I/O happens past this point.

use crate::codecs;
use crate::detect::MediaFormat;
use crate::error::ParseError;
use crate::fourcc::FourCC;
use crate::readers::ebml::EbmlRaw;
use crate::readers::flac::FlacRaw;
use crate::readers::flv::FlvRaw;
use crate::readers::iso::{self, IsoRaw};
use crate::readers::mpeg::{MpegAudio, MpegRaw};
use crate::readers::ogg::{OggCodec, OggRaw};
use crate::readers::riff::{RiffRaw, WaveFormat};
use crate::readers::{Parsed, RawFields};
use crate::record::{MediaRecord, StreamDescriptor, StreamKind, TagKey, TagSet};

/// Fields shared by every family once translated.
#[derive(Debug, Default)]
struct Summary {
    duration: f64,
    bitrate_kbps: u32,
    /// Whether `bitrate_kbps` came from the file rather than an estimate.
    bitrate_declared: bool,
    streams: Vec<StreamDescriptor>,
    tags: TagSet,
    warnings: Vec<String>,
}

impl Summary {
    fn captured_anything(&self) -> bool {
        self.duration > 0.0 || !self.streams.is_empty() || !self.tags.is_empty()
    }

    fn unknown_codec(&mut self, container: &str, raw: &str) -> String {
        self.warnings
            .push(format!("unknown {container} codec '{raw}', reported verbatim"));
        raw.to_string()
    }
}

pub fn normalize(
    format: MediaFormat,
    file_size: u64,
    parsed: Parsed<RawFields>,
    detection_warnings: Vec<String>,
) -> MediaRecord {
    let mut s = Summary::default();
    match &parsed.raw {
        RawFields::Riff(raw) => riff(raw, format, &mut s),
        RawFields::Iso(raw) => isobmff(raw, &mut s),
        RawFields::Ogg(raw) => ogg(raw, &mut s),
        RawFields::Flac(raw) => flac(raw, file_size, &mut s),
        RawFields::Ebml(raw) => ebml(raw, &mut s),
        RawFields::Mpeg(raw) => mpeg(raw, file_size, &mut s),
        RawFields::Flv(raw) => flv(raw, &mut s),
        RawFields::Unknown => {}
    }
    if !s.duration.is_finite() || s.duration < 0.0 {
        s.warnings.push(format!("discarding invalid duration {}", s.duration));
        s.duration = 0.0;
    }
    if !s.bitrate_declared && s.bitrate_kbps == 0 && s.duration > 0.0 && file_size > 0 {
        s.bitrate_kbps = kbps(file_size, s.duration);
        s.warnings
            .push("overall bitrate estimated from file size".to_string());
    }

    let mut warnings = detection_warnings;
    warnings.extend(parsed.warnings);
    warnings.append(&mut s.warnings);

    let errors = match &parsed.error {
        None => Vec::new(),
        Some(e) => vec![error_message(e, s.captured_anything())],
    };

    MediaRecord {
        container: format.container(),
        format: format.label().to_string(),
        duration_seconds: s.duration,
        bitrate_kbps: s.bitrate_kbps,
        streams: s.streams,
        tags: s.tags,
        success: errors.is_empty(),
        warnings,
        errors,
    }
}

fn error_message(e: &ParseError, partial: bool) -> String {
    if partial {
        format!("{e} (partial result kept)")
    } else {
        e.to_string()
    }
}

/// Average kbps for `bytes` played over `seconds`.
fn kbps(bytes: u64, seconds: f64) -> u32 {
    if seconds <= 0.0 {
        return 0;
    }
    (bytes as f64 * 8.0 / seconds / 1000.0).round() as u32
}

fn nonzero<T: Default + PartialEq>(v: T) -> Option<T> {
    (v != T::default()).then_some(v)
}

fn wave_codec(fmt: &WaveFormat, s: &mut Summary) -> String {
    let tag = match (fmt.format_tag, fmt.sub_format) {
        (codecs::WAVE_FORMAT_EXTENSIBLE, Some(sub)) => sub,
        (tag, _) => tag,
    };
    match codecs::wave_format(tag) {
        Some(name) => name.to_string(),
        None => s.unknown_codec("WAVE", &format!("0x{tag:04X}")),
    }
}

fn wave_stream(fmt: &WaveFormat, s: &mut Summary) -> StreamDescriptor {
    let mut d = StreamDescriptor::new(StreamKind::Audio, wave_codec(fmt, s));
    d.channels = nonzero(fmt.channels);
    d.sample_rate = nonzero(fmt.sample_rate);
    d.bit_depth = nonzero(fmt.bits_per_sample);
    d.bitrate_kbps = (fmt.byte_rate as u64 * 8 / 1000) as u32;
    d
}

/// The RIFF form type decides the layout; the detected format only labels
/// the record.
fn riff(raw: &RiffRaw, format: MediaFormat, s: &mut Summary) {
    let is_avi = raw.form == Some(FourCC::new(b"AVI "));
    if let Some(form) = raw.form.filter(|_| is_avi != (format == MediaFormat::Avi)) {
        s.warnings.push(format!(
            "RIFF form '{}' does not match {}",
            form.trimmed(),
            format.label()
        ));
    }
    if is_avi {
        avi(raw, s)
    } else {
        wav(raw, s)
    }
}

fn wav(raw: &RiffRaw, s: &mut Summary) {
    s.tags = raw.tags.clone();
    let Some(fmt) = &raw.wave else { return };
    let stream = wave_stream(fmt, s);
    if let Some(data) = raw.data_size {
        s.duration = if fmt.block_align > 0 && fmt.sample_rate > 0 {
            (data / fmt.block_align as u64) as f64 / fmt.sample_rate as f64
        } else if fmt.byte_rate > 0 {
            data as f64 / fmt.byte_rate as f64
        } else {
            0.0
        };
    }
    s.bitrate_kbps = stream.bitrate_kbps;
    s.bitrate_declared = stream.bitrate_kbps > 0;
    s.streams.push(stream);
}

fn avi(raw: &RiffRaw, s: &mut Summary) {
    s.tags = raw.tags.clone();
    if let Some(h) = &raw.avi_header {
        s.duration = h.total_frames as f64 * h.us_per_frame as f64 / 1e6;
        if h.max_bytes_per_sec > 0 {
            s.bitrate_kbps = (h.max_bytes_per_sec as u64 * 8 / 1000) as u32;
            s.bitrate_declared = true;
        }
    }
    for st in &raw.streams {
        let fps = (st.scale > 0 && st.rate > 0).then(|| st.rate as f64 / st.scale as f64);
        match &st.stream_type.0 {
            b"vids" => {
                let code = st
                    .video
                    .map(|b| b.compression)
                    .filter(|c| c.0 != [0; 4])
                    .unwrap_or(st.handler);
                let codec = match codecs::avi_video_codec(&code.to_display_string()) {
                    Some(name) => name.to_string(),
                    None => s.unknown_codec("AVI", &code.trimmed()),
                };
                let mut d = StreamDescriptor::new(StreamKind::Video, codec);
                let (w, h) = match (&st.video, &raw.avi_header) {
                    (Some(b), _) if b.width > 0 => (b.width, b.height),
                    (_, Some(h)) => (h.width, h.height),
                    _ => (0, 0),
                };
                d.width = nonzero(w);
                d.height = nonzero(h);
                d.fps = fps;
                d.frame_count = nonzero(st.length as u64);
                d.bit_depth = st.video.and_then(|b| nonzero(b.bit_count));
                s.streams.push(d);
            }
            b"auds" => {
                let d = match &st.audio {
                    Some(fmt) => wave_stream(fmt, s),
                    None => StreamDescriptor::new(StreamKind::Audio, st.handler.trimmed()),
                };
                s.streams.push(d);
            }
            b"txts" => {
                let codec = match st.handler.trimmed() {
                    h if h.is_empty() => "text".to_string(),
                    h => h,
                };
                s.streams.push(StreamDescriptor::new(StreamKind::Subtitle, codec));
            }
            _ => s
                .warnings
                .push(format!("AVI stream of type '{}' ignored", st.stream_type)),
        }
    }
}

fn isobmff(raw: &IsoRaw, s: &mut Summary) {
    s.tags = raw.tags.clone();
    if let (Some(ts), Some(dur)) = (raw.movie_timescale, raw.movie_duration) {
        if ts > 0 {
            s.duration = dur as f64 / ts as f64;
        }
    }
    for t in &raw.tracks {
        let entry_lookup = t
            .entry
            .as_ref()
            .map(|e| (e.format, codecs::iso_sample_entry(&e.format.to_display_string())));
        let kind = iso::handler_kind(t.handler).or(entry_lookup.and_then(|(_, l)| l.map(|(_, k)| k)));
        let Some(kind) = kind else {
            continue;
        };
        let codec = match entry_lookup {
            Some((_, Some((name, _)))) => name.to_string(),
            Some((fmt, None)) => s.unknown_codec("ISO", &fmt.trimmed()),
            None => s.unknown_codec("ISO", "none"),
        };
        let mut d = StreamDescriptor::new(kind, codec);
        let track_seconds = match (t.timescale, t.duration) {
            (Some(ts), Some(dur)) if ts > 0 => Some(dur as f64 / ts as f64),
            _ => None,
        };
        let entry = t.entry.as_ref();
        match kind {
            StreamKind::Video => {
                d.width = entry.and_then(|e| e.width).filter(|w| *w > 0).map(u32::from).or(t.width.filter(|w| *w > 0));
                d.height = entry.and_then(|e| e.height).filter(|h| *h > 0).map(u32::from).or(t.height.filter(|h| *h > 0));
                if t.sample_count > 0 {
                    d.frame_count = Some(t.sample_count);
                    if t.sample_ticks > 0 {
                        if let Some(ts) = t.timescale {
                            d.fps = Some(t.sample_count as f64 * ts as f64 / t.sample_ticks as f64);
                        }
                    }
                }
            }
            StreamKind::Audio => {
                d.channels = entry.and_then(|e| e.channels).filter(|c| *c > 0);
                d.sample_rate = entry.and_then(|e| e.sample_rate).filter(|r| *r > 0);
                d.bit_depth = entry.and_then(|e| e.sample_size).filter(|b| *b > 0);
            }
            StreamKind::Subtitle => {}
        }
        d.language = t.language.clone();
        if s.duration == 0.0 {
            if let Some(secs) = track_seconds {
                s.duration = s.duration.max(secs);
            }
        }
        s.streams.push(d);
    }
}

fn ogg(raw: &OggRaw, s: &mut Summary) {
    s.tags = raw.tags.clone();
    let Some(codec) = raw.codec else { return };
    let mut d = match codec {
        OggCodec::Vorbis => StreamDescriptor::new(StreamKind::Audio, "Vorbis"),
        OggCodec::Opus => StreamDescriptor::new(StreamKind::Audio, "Opus"),
    };
    d.channels = nonzero(raw.channels as u16);
    d.sample_rate = nonzero(raw.sample_rate);
    if let Some(granule) = raw.last_granule {
        s.duration = match codec {
            OggCodec::Vorbis if raw.sample_rate > 0 => granule as f64 / raw.sample_rate as f64,
            OggCodec::Opus => granule.saturating_sub(raw.pre_skip as u64) as f64 / 48_000.0,
            _ => 0.0,
        };
    }
    if let Some(nominal) = raw.nominal_bitrate {
        d.bitrate_kbps = nominal / 1000;
        s.bitrate_kbps = d.bitrate_kbps;
        s.bitrate_declared = true;
    }
    s.streams.push(d);
}

fn flac(raw: &FlacRaw, file_size: u64, s: &mut Summary) {
    s.tags = raw.tags.clone();
    s.tags.merge_missing(&raw.id3_tags);
    let Some(info) = raw.stream_info else { return };
    let mut d = StreamDescriptor::new(StreamKind::Audio, "FLAC");
    d.channels = Some(info.channels as u16);
    d.sample_rate = nonzero(info.sample_rate);
    d.bit_depth = Some(info.bits_per_sample as u16);
    if info.sample_rate > 0 {
        s.duration = info.total_samples as f64 / info.sample_rate as f64;
    }
    s.bitrate_kbps = kbps(file_size, s.duration);
    s.bitrate_declared = true;
    d.bitrate_kbps = s.bitrate_kbps;
    s.streams.push(d);
}

fn ebml(raw: &EbmlRaw, s: &mut Summary) {
    s.tags = raw.tags.clone();
    if let Some(title) = &raw.title {
        s.tags.set_if_absent(TagKey::Title, title);
    }
    if let Some(ticks) = raw.duration {
        s.duration = ticks * raw.timestamp_scale as f64 / 1e9;
    }
    for t in &raw.tracks {
        let kind = match t.track_type {
            Some(1) => StreamKind::Video,
            Some(2) => StreamKind::Audio,
            Some(17) => StreamKind::Subtitle,
            other => {
                s.warnings.push(format!(
                    "track {} of type {} ignored",
                    t.number.unwrap_or(0),
                    other.map_or("unset".to_string(), |v| v.to_string())
                ));
                continue;
            }
        };
        let raw_id = t.codec_id.as_deref().unwrap_or("");
        let codec = match codecs::matroska_codec(raw_id) {
            Some(name) => name.to_string(),
            None => s.unknown_codec("Matroska", raw_id),
        };
        let mut d = StreamDescriptor::new(kind, codec);
        match kind {
            StreamKind::Video => {
                d.width = t.width.and_then(|w| u32::try_from(w).ok());
                d.height = t.height.and_then(|h| u32::try_from(h).ok());
                d.fps = t
                    .frame_rate
                    .filter(|f| *f > 0.0)
                    .or_else(|| t.default_duration_ns.filter(|ns| *ns > 0).map(|ns| 1e9 / ns as f64));
            }
            StreamKind::Audio => {
                d.channels = t.channels.and_then(|c| u16::try_from(c).ok());
                d.sample_rate = t.sampling_frequency.filter(|f| *f > 0.0).map(|f| f.round() as u32);
                d.bit_depth = t.bit_depth.and_then(|b| u16::try_from(b).ok());
            }
            StreamKind::Subtitle => {}
        }
        d.language = t.language.clone().filter(|l| l != "und");
        s.streams.push(d);
    }
}

fn mpeg(raw: &MpegRaw, file_size: u64, s: &mut Summary) {
    s.tags = raw.tags.clone();
    match &raw.audio {
        Some(MpegAudio::Layer {
            first,
            frames,
            bitrate_sum,
            ..
        }) => {
            let codec = match first.layer {
                1 => "MP1",
                2 => "MP2",
                _ => "MP3",
            };
            let mut d = StreamDescriptor::new(StreamKind::Audio, codec);
            d.channels = Some(first.channels());
            d.sample_rate = Some(first.sample_rate);
            let avg = bitrate_sum / (*frames).max(1);
            if avg > 0 {
                s.duration = file_size as f64 * 8.0 / (avg as f64 * 1000.0);
            }
            d.bitrate_kbps = avg as u32;
            s.bitrate_kbps = avg as u32;
            s.bitrate_declared = true;
            s.streams.push(d);
        }
        Some(MpegAudio::Adts { first, frames, bytes }) => {
            let codec = match first.profile {
                0 => "AAC Main",
                1 => "AAC-LC",
                2 => "AAC SSR",
                _ => "AAC LTP",
            };
            let mut d = StreamDescriptor::new(StreamKind::Audio, codec);
            d.channels = nonzero(first.channel_config as u16);
            d.sample_rate = Some(first.sample_rate);
            s.duration = *frames as f64 * 1024.0 / first.sample_rate as f64;
            d.bitrate_kbps = kbps(*bytes, s.duration);
            s.bitrate_kbps = d.bitrate_kbps;
            s.bitrate_declared = true;
            s.streams.push(d);
        }
        None => {}
    }
}

fn flv(raw: &FlvRaw, s: &mut Summary) {
    s.duration = raw
        .meta("duration")
        .filter(|d| *d > 0.0)
        .unwrap_or(raw.max_timestamp_ms as f64 / 1000.0);

    if let Some(v) = raw.video {
        let codec = match codecs::flv_video_codec(v.codec_id) {
            Some(name) => name.to_string(),
            None => s.unknown_codec("FLV video", &v.codec_id.to_string()),
        };
        let mut d = StreamDescriptor::new(StreamKind::Video, codec);
        d.width = raw.meta("width").filter(|w| *w > 0.0).map(|w| w as u32);
        d.height = raw.meta("height").filter(|h| *h > 0.0).map(|h| h as u32);
        d.fps = raw.meta("framerate").filter(|f| *f > 0.0);
        d.frame_count = nonzero(raw.video_frames);
        d.bitrate_kbps = raw
            .meta("videodatarate")
            .map_or_else(|| kbps(raw.video_bytes, s.duration), |r| r.round() as u32);
        s.streams.push(d);
    } else if raw.has_video_flag {
        s.warnings
            .push("header announces video but no video tag was found".to_string());
    }

    if let Some(a) = raw.audio {
        let codec = match codecs::flv_audio_codec(a.codec_id) {
            Some(name) => name.to_string(),
            None => s.unknown_codec("FLV audio", &a.codec_id.to_string()),
        };
        let mut d = StreamDescriptor::new(StreamKind::Audio, codec);
        d.sample_rate = raw
            .meta("audiosamplerate")
            .filter(|r| *r > 0.0)
            .map(|r| r as u32)
            .or(Some(codecs::FLV_SAMPLE_RATES[a.rate_index as usize & 0x3]));
        let stereo = raw.meta("stereo").map_or(a.stereo, |v| v != 0.0);
        d.channels = Some(if stereo { 2 } else { 1 });
        d.bit_depth = Some(if a.sixteen_bit { 16 } else { 8 });
        d.bitrate_kbps = raw
            .meta("audiodatarate")
            .map_or_else(|| kbps(raw.audio_bytes, s.duration), |r| r.round() as u32);
        s.streams.push(d);
    } else if raw.has_audio_flag {
        s.warnings
            .push("header announces audio but no audio tag was found".to_string());
    }

    // tag payload sizes only estimate per-stream rates; the overall rate
    // counts as declared only when metadata gives one
    let declared: u32 = [(raw.video.is_some(), "videodatarate"), (raw.audio.is_some(), "audiodatarate")]
        .into_iter()
        .filter(|(present, _)| *present)
        .filter_map(|(_, k)| raw.meta(k))
        .map(|r| r.round() as u32)
        .sum();
    if declared > 0 {
        s.bitrate_kbps = declared;
        s.bitrate_declared = true;
    }
}
