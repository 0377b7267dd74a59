//! Builders for small synthetic media files.
#![allow(dead_code)]

use mediaprobe::{AnalyzeOptions, MediaRecord, analyze_reader};
use std::io::Cursor;

pub fn analyze_bytes(name: &str, data: &[u8]) -> MediaRecord {
    analyze_bytes_with(name, data, &AnalyzeOptions::default())
}

pub fn analyze_bytes_with(name: &str, data: &[u8], opts: &AnalyzeOptions) -> MediaRecord {
    let mut cur = Cursor::new(data.to_vec());
    analyze_reader(&mut cur, name, opts)
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ---------------------------------------------------------------- RIFF

pub fn chunk(id: &[u8; 4], payload: &[u8], pad: bool) -> Vec<u8> {
    let mut v = id.to_vec();
    v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    v.extend_from_slice(payload);
    if pad && payload.len() % 2 == 1 {
        v.push(0);
    }
    v
}

pub fn list(list_type: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut body = list_type.to_vec();
    for c in chunks {
        body.extend_from_slice(c);
    }
    chunk(b"LIST", &body, true)
}

pub fn riff(form: &[u8; 4], chunks: &[Vec<u8>]) -> Vec<u8> {
    let body_len: usize = 4 + chunks.iter().map(Vec::len).sum::<usize>();
    let mut v = b"RIFF".to_vec();
    v.extend_from_slice(&(body_len as u32).to_le_bytes());
    v.extend_from_slice(form);
    for c in chunks {
        v.extend_from_slice(c);
    }
    v
}

pub fn wave_fmt(tag: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut v = Vec::new();
    v.extend_from_slice(&tag.to_le_bytes());
    v.extend_from_slice(&channels.to_le_bytes());
    v.extend_from_slice(&rate.to_le_bytes());
    v.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
    v.extend_from_slice(&block_align.to_le_bytes());
    v.extend_from_slice(&bits.to_le_bytes());
    v
}

/// PCM WAV holding `samples` frames of silence.
pub fn wav(channels: u16, rate: u32, bits: u16, samples: u32) -> Vec<u8> {
    let data_len = samples as usize * channels as usize * bits as usize / 8;
    riff(
        b"WAVE",
        &[
            chunk(b"fmt ", &wave_fmt(1, channels, rate, bits), true),
            chunk(b"data", &vec![0u8; data_len], true),
        ],
    )
}

fn avih(us_per_frame: u32, frames: u32, width: u32, height: u32) -> Vec<u8> {
    let mut v = Vec::new();
    for x in [us_per_frame, 0, 0, 0x10, frames, 0, 1, 0, width, height] {
        v.extend_from_slice(&x.to_le_bytes());
    }
    v.extend_from_slice(&[0u8; 16]);
    v
}

fn strh(kind: &[u8; 4], handler: &[u8; 4], scale: u32, rate: u32, length: u32) -> Vec<u8> {
    let mut v = kind.to_vec();
    v.extend_from_slice(handler);
    v.extend_from_slice(&[0u8; 12]);
    for x in [scale, rate, 0, length] {
        v.extend_from_slice(&x.to_le_bytes());
    }
    v.resize(56, 0);
    v
}

fn bitmap_info(width: u32, height: u32, compression: &[u8; 4]) -> Vec<u8> {
    let mut v = 40u32.to_le_bytes().to_vec();
    v.extend_from_slice(&width.to_le_bytes());
    v.extend_from_slice(&height.to_le_bytes());
    v.extend_from_slice(&1u16.to_le_bytes());
    v.extend_from_slice(&24u16.to_le_bytes());
    v.extend_from_slice(compression);
    v.resize(40, 0);
    v
}

/// AVI with one video stream at 25 fps and one 44.1 kHz stereo PCM stream.
pub fn avi(width: u32, height: u32, frames: u32, codec: &[u8; 4]) -> Vec<u8> {
    let video = list(
        b"strl",
        &[
            chunk(b"strh", &strh(b"vids", codec, 1, 25, frames), true),
            chunk(b"strf", &bitmap_info(width, height, codec), true),
        ],
    );
    let audio = list(
        b"strl",
        &[
            chunk(b"strh", &strh(b"auds", &[0; 4], 1, 44_100, 0), true),
            chunk(b"strf", &wave_fmt(1, 2, 44_100, 16), true),
        ],
    );
    let hdrl = list(
        b"hdrl",
        &[chunk(b"avih", &avih(40_000, frames, width, height), true), video, audio],
    );
    let info = list(b"INFO", &[chunk(b"INAM", b"Clip\0", true)]);
    let movi = list(b"movi", &[chunk(b"00dc", &[0u8; 64], true)]);
    riff(b"AVI ", &[hdrl, info, movi])
}

// ---------------------------------------------------------------- ISO BMFF

pub fn atom(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut v = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
    v.extend_from_slice(typ);
    v.extend_from_slice(payload);
    v
}

pub fn full_atom(typ: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0u8; 4];
    body.extend_from_slice(payload);
    atom(typ, &body)
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

pub fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
    let mut p = brand.to_vec();
    p.extend_from_slice(&512u32.to_be_bytes());
    p.extend_from_slice(b"isom");
    atom(b"ftyp", &p)
}

fn mvhd(timescale: u32, duration: u32) -> Vec<u8> {
    let mut p = vec![0u8; 8];
    p.extend_from_slice(&timescale.to_be_bytes());
    p.extend_from_slice(&duration.to_be_bytes());
    p.resize(96, 0);
    full_atom(b"mvhd", &p)
}

fn tkhd(width: u32, height: u32) -> Vec<u8> {
    let mut p = vec![0u8; 20 + 52];
    p.extend_from_slice(&(width << 16).to_be_bytes());
    p.extend_from_slice(&(height << 16).to_be_bytes());
    full_atom(b"tkhd", &p)
}

fn mdhd(timescale: u32, duration: u32, lang: &str) -> Vec<u8> {
    let mut p = vec![0u8; 8];
    p.extend_from_slice(&timescale.to_be_bytes());
    p.extend_from_slice(&duration.to_be_bytes());
    let l = lang.as_bytes();
    let packed = ((l[0] - 0x60) as u16) << 10 | ((l[1] - 0x60) as u16) << 5 | (l[2] - 0x60) as u16;
    p.extend_from_slice(&packed.to_be_bytes());
    p.extend_from_slice(&[0, 0]);
    full_atom(b"mdhd", &p)
}

fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
    let mut p = vec![0u8; 4];
    p.extend_from_slice(handler);
    p.extend_from_slice(&[0u8; 12]);
    p.push(0);
    full_atom(b"hdlr", &p)
}

fn visual_entry(format: &[u8; 4], width: u16, height: u16) -> Vec<u8> {
    let mut e = 86u32.to_be_bytes().to_vec();
    e.extend_from_slice(format);
    e.resize(32, 0);
    e.extend_from_slice(&width.to_be_bytes());
    e.extend_from_slice(&height.to_be_bytes());
    e.resize(86, 0);
    e
}

fn audio_entry(format: &[u8; 4], channels: u16, sample_size: u16, rate: u32) -> Vec<u8> {
    let mut e = 36u32.to_be_bytes().to_vec();
    e.extend_from_slice(format);
    e.resize(24, 0);
    e.extend_from_slice(&channels.to_be_bytes());
    e.extend_from_slice(&sample_size.to_be_bytes());
    e.resize(32, 0);
    e.extend_from_slice(&(rate << 16).to_be_bytes());
    e
}

fn stbl(entry: Vec<u8>, time_to_sample: &[(u32, u32)]) -> Vec<u8> {
    let mut stsd = 1u32.to_be_bytes().to_vec();
    stsd.extend(entry);
    let mut stts = (time_to_sample.len() as u32).to_be_bytes().to_vec();
    for (samples, delta) in time_to_sample {
        stts.extend_from_slice(&samples.to_be_bytes());
        stts.extend_from_slice(&delta.to_be_bytes());
    }
    atom(b"stbl", &concat(&[full_atom(b"stsd", &stsd), full_atom(b"stts", &stts)]))
}

pub fn video_trak(codec: &[u8; 4], width: u16, height: u16, timescale: u32, frames: u32, delta: u32) -> Vec<u8> {
    video_trak_with_stts(codec, width, height, timescale, frames * delta, &[(frames, delta)])
}

/// Video track with an explicit `stts` table of (sample count, delta) runs.
pub fn video_trak_with_stts(
    codec: &[u8; 4],
    width: u16,
    height: u16,
    timescale: u32,
    duration: u32,
    time_to_sample: &[(u32, u32)],
) -> Vec<u8> {
    let mdia = atom(
        b"mdia",
        &concat(&[
            mdhd(timescale, duration, "und"),
            hdlr(b"vide"),
            atom(b"minf", &stbl(visual_entry(codec, width, height), time_to_sample)),
        ]),
    );
    atom(b"trak", &concat(&[tkhd(width as u32, height as u32), mdia]))
}

pub fn audio_trak(codec: &[u8; 4], channels: u16, rate: u32, samples: u32) -> Vec<u8> {
    let mdia = atom(
        b"mdia",
        &concat(&[
            mdhd(rate, samples * 1024, "eng"),
            hdlr(b"soun"),
            atom(b"minf", &stbl(audio_entry(codec, channels, 16, rate), &[(samples, 1024)])),
        ]),
    );
    atom(b"trak", &concat(&[tkhd(0, 0), mdia]))
}

pub fn ilst_text(code: &[u8; 4], text: &str) -> Vec<u8> {
    let mut data = vec![0, 0, 0, 1, 0, 0, 0, 0];
    data.extend_from_slice(text.as_bytes());
    atom(code, &atom(b"data", &data))
}

pub fn meta_ilst(items: &[Vec<u8>]) -> Vec<u8> {
    full_atom(b"meta", &concat(&[hdlr(b"mdir"), atom(b"ilst", &concat(items))]))
}

pub fn udta_ilst(items: &[Vec<u8>]) -> Vec<u8> {
    atom(b"udta", &meta_ilst(items))
}

/// `ftyp`, `mdat`, then `moov` last so that every proper prefix lacks a
/// complete `moov`.
pub fn mp4(brand: &[u8; 4], timescale: u32, duration: u32, traks: &[Vec<u8>], udta: Option<Vec<u8>>) -> Vec<u8> {
    let mut moov = mvhd(timescale, duration);
    for t in traks {
        moov.extend_from_slice(t);
    }
    if let Some(u) = udta {
        moov.extend(u);
    }
    concat(&[ftyp(brand), atom(b"mdat", &[0u8; 32]), atom(b"moov", &moov)])
}

// ---------------------------------------------------------------- Ogg

fn lacing(len: usize) -> Vec<u8> {
    let mut v = vec![255u8; len / 255];
    v.push((len % 255) as u8);
    v
}

pub fn ogg_page(header_type: u8, granule: u64, serial: u32, seq: u32, packets: &[Vec<u8>]) -> Vec<u8> {
    let mut segments = Vec::new();
    let mut payload = Vec::new();
    for p in packets {
        segments.extend(lacing(p.len()));
        payload.extend_from_slice(p);
    }
    let mut v = b"OggS".to_vec();
    v.push(0);
    v.push(header_type);
    v.extend_from_slice(&granule.to_le_bytes());
    v.extend_from_slice(&serial.to_le_bytes());
    v.extend_from_slice(&seq.to_le_bytes());
    v.extend_from_slice(&[0u8; 4]);
    v.push(segments.len() as u8);
    v.extend(segments);
    v.extend(payload);
    v
}

pub fn vorbis_comment_block(vendor: &str, fields: &[&str]) -> Vec<u8> {
    let mut v = (vendor.len() as u32).to_le_bytes().to_vec();
    v.extend_from_slice(vendor.as_bytes());
    v.extend_from_slice(&(fields.len() as u32).to_le_bytes());
    for f in fields {
        v.extend_from_slice(&(f.len() as u32).to_le_bytes());
        v.extend_from_slice(f.as_bytes());
    }
    v
}

pub fn ogg_vorbis(channels: u8, rate: u32, nominal: i32, last_granule: u64, fields: &[&str]) -> Vec<u8> {
    let mut ident = b"\x01vorbis".to_vec();
    ident.extend_from_slice(&0u32.to_le_bytes());
    ident.push(channels);
    ident.extend_from_slice(&rate.to_le_bytes());
    ident.extend_from_slice(&0i32.to_le_bytes());
    ident.extend_from_slice(&nominal.to_le_bytes());
    ident.extend_from_slice(&0i32.to_le_bytes());
    ident.extend_from_slice(&[0xB8, 0x01]);

    let mut comment = b"\x03vorbis".to_vec();
    comment.extend(vorbis_comment_block("synthetic", fields));
    comment.push(1);
    let setup = b"\x05vorbis\x00".to_vec();

    let serial = 0x1234;
    concat(&[
        ogg_page(0x02, 0, serial, 0, &[ident]),
        ogg_page(0x00, 0, serial, 1, &[comment, setup]),
        ogg_page(0x00, last_granule / 2, serial, 2, &[vec![0u8; 40]]),
        ogg_page(0x04, last_granule, serial, 3, &[vec![0u8; 40]]),
    ])
}

pub fn ogg_opus(channels: u8, pre_skip: u16, last_granule: u64) -> Vec<u8> {
    let mut head = b"OpusHead".to_vec();
    head.push(1);
    head.push(channels);
    head.extend_from_slice(&pre_skip.to_le_bytes());
    head.extend_from_slice(&48_000u32.to_le_bytes());
    head.extend_from_slice(&[0, 0, 0]);
    let mut tags = b"OpusTags".to_vec();
    tags.extend(vorbis_comment_block("libopus", &["TITLE=Opus Song"]));
    let serial = 7;
    concat(&[
        ogg_page(0x02, 0, serial, 0, &[head]),
        ogg_page(0x00, 0, serial, 1, &[tags]),
        ogg_page(0x04, last_granule, serial, 2, &[vec![0u8; 20]]),
    ])
}

// ---------------------------------------------------------------- FLAC

pub fn streaminfo(rate: u32, channels: u8, bits: u8, total_samples: u64) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&4096u16.to_be_bytes());
    v.extend_from_slice(&4096u16.to_be_bytes());
    v.extend_from_slice(&[0u8; 6]);
    let packed = (rate as u64) << 44
        | ((channels - 1) as u64) << 41
        | ((bits - 1) as u64) << 36
        | total_samples;
    v.extend_from_slice(&packed.to_be_bytes());
    v.extend_from_slice(&[0u8; 16]);
    v
}

fn flac_block(block_type: u8, last: bool, body: &[u8]) -> Vec<u8> {
    let mut v = vec![if last { 0x80 | block_type } else { block_type }];
    v.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    v.extend_from_slice(body);
    v
}

/// Native FLAC: STREAMINFO, a VORBIS_COMMENT block, then fake frame data
/// beginning with a frame sync code.
pub fn flac(rate: u32, channels: u8, bits: u8, total_samples: u64, fields: &[&str]) -> Vec<u8> {
    concat(&[
        b"fLaC".to_vec(),
        flac_block(0, false, &streaminfo(rate, channels, bits, total_samples)),
        flac_block(4, true, &vorbis_comment_block("reference libFLAC", fields)),
        vec![0xFF, 0xF8, 0x69, 0x08, 0x00, 0x00],
        vec![0u8; 200],
    ])
}

/// Offset of the first audio frame in [`flac`] output.
pub fn flac_audio_offset(fields: &[&str]) -> usize {
    4 + 4 + 34 + 4 + vorbis_comment_block("reference libFLAC", fields).len()
}

// ---------------------------------------------------------------- EBML

pub fn ebml_el(id: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut v = id.to_vec();
    let n = payload.len();
    if n < 0x7F {
        v.push(0x80 | n as u8);
    } else {
        v.push(0x01);
        v.extend_from_slice(&(n as u64).to_be_bytes()[1..]);
    }
    v.extend_from_slice(payload);
    v
}

pub struct MkvTrack<'a> {
    pub track_type: u8,
    pub codec_id: &'a str,
    pub language: Option<&'a str>,
    pub video: Option<(u16, u16)>,
    pub audio: Option<(f64, u8)>,
}

fn track_entry(number: u8, t: &MkvTrack<'_>) -> Vec<u8> {
    let mut e = ebml_el(&[0xD7], &[number]);
    e.extend(ebml_el(&[0x83], &[t.track_type]));
    e.extend(ebml_el(&[0x86], t.codec_id.as_bytes()));
    if let Some(lang) = t.language {
        e.extend(ebml_el(&[0x22, 0xB5, 0x9C], lang.as_bytes()));
    }
    if let Some((w, h)) = t.video {
        let mut v = ebml_el(&[0xB0], &w.to_be_bytes());
        v.extend(ebml_el(&[0xBA], &h.to_be_bytes()));
        e.extend(ebml_el(&[0xE0], &v));
    }
    if let Some((rate, channels)) = t.audio {
        let mut a = ebml_el(&[0xB5], &rate.to_be_bytes());
        a.extend(ebml_el(&[0x9F], &[channels]));
        e.extend(ebml_el(&[0xE1], &a));
    }
    ebml_el(&[0xAE], &e)
}

fn simple_tag(name: &str, value: &str) -> Vec<u8> {
    let mut s = ebml_el(&[0x45, 0xA3], name.as_bytes());
    s.extend(ebml_el(&[0x44, 0x87], value.as_bytes()));
    ebml_el(&[0x67, 0xC8], &s)
}

/// Matroska/WebM file with Info, Tracks, Tags and one small Cluster.
/// `duration_ms` is in ticks of the default 1 ms timestamp scale.
pub fn mkv(doc_type: &str, duration_ms: f64, title: &str, tracks: &[MkvTrack<'_>], tags: &[(&str, &str)]) -> Vec<u8> {
    let header = ebml_el(&[0x1A, 0x45, 0xDF, 0xA3], &ebml_el(&[0x42, 0x82], doc_type.as_bytes()));

    let mut info = ebml_el(&[0x2A, 0xD7, 0xB1], &[0x0F, 0x42, 0x40]);
    info.extend(ebml_el(&[0x44, 0x89], &duration_ms.to_be_bytes()));
    info.extend(ebml_el(&[0x7B, 0xA9], title.as_bytes()));

    let mut entries = Vec::new();
    for (i, t) in tracks.iter().enumerate() {
        entries.extend(track_entry(i as u8 + 1, t));
    }

    let mut tag_body = Vec::new();
    for (name, value) in tags {
        tag_body.extend(simple_tag(name, value));
    }

    let mut segment = ebml_el(&[0x15, 0x49, 0xA9, 0x66], &info);
    segment.extend(ebml_el(&[0x16, 0x54, 0xAE, 0x6B], &entries));
    segment.extend(ebml_el(&[0x1F, 0x43, 0xB6, 0x75], &[0xE7, 0x81, 0x00, 0xA3, 0x84, 0x81, 0, 0, 0x80]));
    segment.extend(ebml_el(&[0x12, 0x54, 0xC3, 0x67], &ebml_el(&[0x73, 0x73], &tag_body)));

    concat(&[header, ebml_el(&[0x18, 0x53, 0x80, 0x67], &segment)])
}

// ---------------------------------------------------------------- MPEG audio

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo, unpadded: 417 bytes.
pub const MP3_FRAME_LEN: usize = 417;

pub fn mp3_frames(count: usize) -> Vec<u8> {
    let mut v = Vec::with_capacity(count * MP3_FRAME_LEN);
    for _ in 0..count {
        let mut f = vec![0xFF, 0xFB, 0x90, 0x40];
        f.resize(MP3_FRAME_LEN, 0);
        v.extend(f);
    }
    v
}

/// ID3v2.3 tag with Latin-1 text frames.
pub fn id3v23(frames: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, text) in frames {
        let mut payload = vec![0u8];
        if *id == "COMM" {
            payload.extend_from_slice(b"eng\0");
        }
        payload.extend_from_slice(text.as_bytes());
        body.extend_from_slice(id.as_bytes());
        body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        body.extend_from_slice(&[0, 0]);
        body.extend(payload);
    }
    body.extend_from_slice(&[0u8; 16]);
    let n = body.len() as u32;
    let mut v = b"ID3\x03\x00\x00".to_vec();
    v.extend_from_slice(&[
        ((n >> 21) & 0x7F) as u8,
        ((n >> 14) & 0x7F) as u8,
        ((n >> 7) & 0x7F) as u8,
        (n & 0x7F) as u8,
    ]);
    v.extend(body);
    v
}

pub fn id3v1(title: &str, artist: &str, year: &str, track: u8, genre: u8) -> Vec<u8> {
    fn field(s: &str, len: usize) -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.resize(len, 0);
        v
    }
    let mut b = b"TAG".to_vec();
    b.extend(field(title, 30));
    b.extend(field(artist, 30));
    b.extend(field("", 30));
    b.extend(field(year, 4));
    let mut comment = field("", 30);
    comment[29] = track;
    b.extend(comment);
    b.push(genre);
    b
}

/// ADTS AAC-LC frames, 44.1 kHz stereo, each `frame_len` bytes.
pub fn adts_frames(count: usize, frame_len: u16) -> Vec<u8> {
    let mut v = Vec::new();
    for _ in 0..count {
        let mut f = vec![
            0xFF,
            0xF1,
            (1 << 6) | (4 << 2),
            (2 << 6) | ((frame_len >> 11) as u8 & 0x3),
            (frame_len >> 3) as u8,
            ((frame_len & 0x7) as u8) << 5 | 0x1F,
            0xFC,
        ];
        f.resize(frame_len as usize, 0);
        v.extend(f);
    }
    v
}

// ---------------------------------------------------------------- FLV

fn amf_string(s: &str) -> Vec<u8> {
    let mut v = vec![0x02];
    v.extend_from_slice(&(s.len() as u16).to_be_bytes());
    v.extend_from_slice(s.as_bytes());
    v
}

pub fn on_meta_data(entries: &[(&str, f64)]) -> Vec<u8> {
    let mut v = amf_string("onMetaData");
    v.push(0x08);
    v.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (k, n) in entries {
        v.extend_from_slice(&(k.len() as u16).to_be_bytes());
        v.extend_from_slice(k.as_bytes());
        v.push(0x00);
        v.extend_from_slice(&n.to_be_bytes());
    }
    v.extend_from_slice(&[0, 0, 0x09]);
    v
}

pub fn flv_tag(tag_type: u8, timestamp_ms: u32, data: &[u8]) -> Vec<u8> {
    let mut v = vec![tag_type];
    v.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);
    v.extend_from_slice(&(timestamp_ms & 0xFF_FFFF).to_be_bytes()[1..]);
    v.push((timestamp_ms >> 24) as u8);
    v.extend_from_slice(&[0, 0, 0]);
    v.extend_from_slice(data);
    v.extend_from_slice(&((11 + data.len()) as u32).to_be_bytes());
    v
}

/// FLV header with both stream flags, followed by `tags` (each carrying its
/// trailing previous-tag-size).
pub fn flv(tags: &[Vec<u8>]) -> Vec<u8> {
    let mut v = b"FLV\x01\x05".to_vec();
    v.extend_from_slice(&9u32.to_be_bytes());
    v.extend_from_slice(&0u32.to_be_bytes());
    for t in tags {
        v.extend_from_slice(t);
    }
    v
}
