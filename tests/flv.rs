mod common;

use common::*;
use mediaprobe::{Container, StreamKind};

const AVC_KEYFRAME: [u8; 5] = [0x17, 0x01, 0, 0, 0];
const AAC_STEREO_44K: [u8; 2] = [0xAF, 0x01];

fn with_meta() -> Vec<u8> {
    let meta = on_meta_data(&[
        ("duration", 12.5),
        ("width", 640.0),
        ("height", 360.0),
        ("framerate", 30.0),
        ("videodatarate", 800.0),
        ("audiodatarate", 128.0),
        ("audiosamplerate", 44_100.0),
    ]);
    let mut tags = vec![flv_tag(18, 0, &meta)];
    for i in 0..10u32 {
        tags.push(flv_tag(9, i * 33, &AVC_KEYFRAME));
        tags.push(flv_tag(8, i * 23, &AAC_STEREO_44K));
    }
    flv(&tags)
}

#[test]
fn metadata_overrides_estimates() {
    let rec = analyze_bytes("show.flv", &with_meta());
    assert!(rec.success, "{:?}", rec.errors);
    assert_eq!(rec.container, Container::Flv);
    assert_eq!(rec.format, "FLV");
    assert!(approx(rec.duration_seconds, 12.5));
    assert_eq!(rec.bitrate_kbps, 928);

    let v = rec.streams_of(StreamKind::Video).next().unwrap();
    assert_eq!(v.codec, "H.264/AVC");
    assert_eq!((v.width, v.height), (Some(640), Some(360)));
    assert_eq!(v.fps, Some(30.0));
    assert_eq!(v.frame_count, Some(10));

    let a = rec.streams_of(StreamKind::Audio).next().unwrap();
    assert_eq!(a.codec, "AAC");
    assert_eq!(a.sample_rate, Some(44_100));
    assert_eq!(a.channels, Some(2));
    assert_eq!(a.bit_depth, Some(16));
}

#[test]
fn duration_from_timestamps_without_metadata() {
    let mut tags = Vec::new();
    for i in 0..=40u32 {
        tags.push(flv_tag(9, i * 100, &AVC_KEYFRAME));
    }
    tags.push(flv_tag(8, 3950, &[0x2E, 0xFF]));
    let rec = analyze_bytes("plain.flv", &flv(&tags));
    assert!(rec.success, "{:?}", rec.errors);
    assert!(approx(rec.duration_seconds, 4.0));
    assert!(rec.warnings.iter().any(|w| w.contains("estimated from file size")));

    let a = rec.streams_of(StreamKind::Audio).next().unwrap();
    assert_eq!(a.codec, "MP3");
    assert_eq!(a.sample_rate, Some(44_100));
    assert_eq!(a.channels, Some(1));
    assert_eq!(a.bit_depth, Some(16));
}

#[test]
fn announced_stream_without_tags_is_warned() {
    let rec = analyze_bytes("audio_only.flv", &flv(&[flv_tag(8, 0, &AAC_STEREO_44K)]));
    assert!(rec.success);
    assert_eq!(rec.streams.len(), 1);
    assert!(rec.warnings.iter().any(|w| w.contains("announces video")));
}

#[test]
fn other_script_events_are_ignored() {
    let mut cue = vec![0x02, 0x00, 0x0A];
    cue.extend_from_slice(b"onCuePoint");
    cue.push(0x05);
    let tags = [flv_tag(18, 0, &cue), flv_tag(9, 0, &AVC_KEYFRAME), flv_tag(8, 0, &AAC_STEREO_44K)];
    let rec = analyze_bytes("cue.flv", &flv(&tags));
    assert!(rec.success, "{:?}", rec.errors);
    assert_eq!(rec.streams.len(), 2);
}

#[test]
fn flv_cut_inside_a_tag_fails() {
    let full = with_meta();
    let meta_tag = 11 + on_meta_data(&[
        ("duration", 12.5),
        ("width", 640.0),
        ("height", 360.0),
        ("framerate", 30.0),
        ("videodatarate", 800.0),
        ("audiodatarate", 128.0),
        ("audiosamplerate", 44_100.0),
    ])
    .len()
        + 4;
    let first_tag = 13;
    for cut in [
        2,
        10,
        first_tag + 5,
        first_tag + 40,
        first_tag + meta_tag - 2,
        first_tag + meta_tag + 3,
        full.len() - 1,
    ] {
        let rec = analyze_bytes("cut.flv", &full[..cut]);
        assert!(!rec.success, "cut at {cut} succeeded");
    }
}
