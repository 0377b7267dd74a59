mod common;

use common::*;
use mediaprobe::{AnalyzeOptions, Container, MediaFormat, analyze, analyze_with};
use std::io::Write;

fn samples() -> Vec<(&'static str, Vec<u8>)> {
    let mut id3_mp3 = id3v23(&[("TIT2", "t")]);
    id3_mp3.extend(mp3_frames(10));
    vec![
        ("a.wav", wav(2, 44_100, 16, 441)),
        ("a.avi", avi(320, 240, 10, b"DIVX")),
        ("a.mp4", mp4(b"isom", 600, 1200, &[video_trak(b"hvc1", 64, 64, 600, 2, 600)], None)),
        ("a.ogg", ogg_vorbis(2, 48_000, 160_000, 96_000, &["TITLE=t"])),
        ("a.opus", ogg_opus(1, 0, 48_000)),
        ("a.flac", flac(44_100, 2, 16, 4410, &["ALBUM=x"])),
        (
            "a.mkv",
            mkv(
                "matroska",
                250.0,
                "m",
                &[MkvTrack {
                    track_type: 2,
                    codec_id: "A_VORBIS",
                    language: None,
                    video: None,
                    audio: Some((44_100.0, 2)),
                }],
                &[],
            ),
        ),
        ("a.mp3", id3_mp3),
        ("a.aac", adts_frames(20, 200)),
        ("a.flv", flv(&[flv_tag(8, 0, &[0xAF, 0x01])])),
    ]
}

#[test]
fn every_family_is_deterministic() {
    for (name, data) in samples() {
        let first = analyze_bytes(name, &data);
        let second = analyze_bytes(name, &data);
        assert!(first.success, "{name}: {:?}", first.errors);
        assert_eq!(first, second, "{name}");
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn every_family_lands_in_its_container() {
    let expected = [
        Container::RiffWav,
        Container::RiffAvi,
        Container::IsoBmff,
        Container::Ogg,
        Container::Ogg,
        Container::Flac,
        Container::Ebml,
        Container::MpegAdts,
        Container::MpegAdts,
        Container::Flv,
    ];
    for ((name, data), container) in samples().into_iter().zip(expected) {
        assert_eq!(analyze_bytes(name, &data).container, container, "{name}");
    }
}

#[test]
fn unrecognized_content_gets_an_audio_estimate() {
    let rec = analyze_bytes("mystery", &[0x13u8; 16_000]);
    assert!(rec.success);
    assert_eq!(rec.container, Container::Unknown);
    assert_eq!(rec.format, "unknown");
    assert_eq!(rec.bitrate_kbps, 128);
    assert!(approx(rec.duration_seconds, 1.0));
    assert!(rec.streams.is_empty());
    assert!(rec.warnings.iter().any(|w| w.contains("approximate")));
}

#[test]
fn video_like_extension_raises_assumed_rate() {
    let rec = analyze_bytes("clip.wmv", &[0x13u8; 250_000]);
    assert!(rec.success);
    assert_eq!(rec.bitrate_kbps, 2000);
    assert!(approx(rec.duration_seconds, 1.0));
}

#[test]
fn content_wins_over_misleading_extension() {
    let rec = analyze_bytes("actually_wav.mp3", &wav(1, 8000, 16, 8000));
    assert!(rec.success, "{:?}", rec.errors);
    assert_eq!(rec.container, Container::RiffWav);
    assert_eq!(rec.format, "WAV");
    assert!(rec.warnings.iter().any(|w| w.contains("extension suggests MP3")));
    assert!(approx(rec.duration_seconds, 1.0));
}

#[test]
fn format_hint_skips_detection() {
    let data = wav(1, 8000, 16, 8000);
    let hinted = analyze_bytes_with("blob.bin", &data, &AnalyzeOptions::default().with_format_hint(MediaFormat::Wav));
    assert!(hinted.success);
    assert_eq!(hinted.format, "WAV");

    let wrong = analyze_bytes_with("blob.bin", &data, &AnalyzeOptions::default().with_format_hint(MediaFormat::Flac));
    assert!(!wrong.success);
    assert_eq!(wrong.container, Container::Flac);
    assert!(wrong.errors[0].contains("fLaC"));
}

#[test]
fn wav_hint_on_avi_content_still_reads_avi_streams() {
    let data = avi(320, 240, 50, b"DIVX");
    let rec = analyze_bytes_with("clip.bin", &data, &AnalyzeOptions::default().with_format_hint(MediaFormat::Wav));
    assert!(rec.success, "{:?}", rec.errors);
    assert_eq!(rec.format, "WAV");
    assert!(rec.streams.iter().any(|s| s.width == Some(320)));
    assert!(approx(rec.duration_seconds, 2.0));
    assert!(rec.warnings.iter().any(|w| w.contains("does not match WAV")));
}

#[test]
fn empty_input_fails_cleanly() {
    let rec = analyze_bytes("empty.wav", &[]);
    assert!(!rec.success);
    assert!(!rec.errors.is_empty());
    assert_eq!(rec.duration_seconds, 0.0);
}

#[test]
fn arbitrary_bytes_never_panic() {
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    let names = ["x.wav", "x.avi", "x.mp4", "x.ogg", "x.flac", "x.mkv", "x.mp3", "x.aac", "x.flv", "x"];
    for round in 0..200 {
        let len = (round * 37) % 700;
        let data: Vec<u8> = (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect();
        let rec = analyze_bytes(names[round % names.len()], &data);
        assert_eq!(rec.success, rec.errors.is_empty(), "round {round}");
        assert!(rec.duration_seconds.is_finite() && rec.duration_seconds >= 0.0);
    }
}

#[test]
fn analyze_reads_from_a_path() {
    let mut file = tempfile::Builder::new().suffix(".flac").tempfile().unwrap();
    file.write_all(&flac(48_000, 2, 24, 240_000, &["TITLE=On Disk"])).unwrap();
    file.flush().unwrap();

    let rec = analyze(file.path(), None);
    assert!(rec.success, "{:?}", rec.errors);
    assert_eq!(rec.container, Container::Flac);
    assert!(approx(rec.duration_seconds, 5.0));
}

#[test]
fn missing_path_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let rec = analyze_with(dir.path().join("absent.mp3"), &AnalyzeOptions::default());
    assert!(!rec.success);
    assert!(rec.errors[0].contains("cannot open"));
    assert_eq!(rec.container, Container::Unknown);
}

#[test]
fn json_shape() {
    let rec = analyze_bytes("a.wav", &wav(2, 44_100, 16, 441));
    let v = serde_json::to_value(&rec).unwrap();
    assert_eq!(v["container"], "RIFF-WAV");
    assert_eq!(v["format"], "WAV");
    assert_eq!(v["success"], true);
    assert_eq!(v["streams"][0]["kind"], "audio");
    assert_eq!(v["streams"][0]["channels"], 2);
    assert!(v["streams"][0].get("width").is_none());
    assert!(v["tags"].as_object().unwrap().is_empty());
}
