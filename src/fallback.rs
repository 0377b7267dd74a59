//! Duration estimate for files no reader claims.

use crate::record::{Container, MediaRecord, TagSet};
use std::path::Path;

/// Assumed rate for audio and anything unrecognized.
pub const AUDIO_ASSUMED_KBPS: u32 = 128;
/// Assumed rate when the extension looks like video.
pub const VIDEO_ASSUMED_KBPS: u32 = 2000;

static VIDEO_LIKE_EXTENSIONS: &[&str] = &[
    "avi", "mp4", "m4v", "mov", "mkv", "webm", "flv", "wmv", "mpg", "mpeg", "ts", "m2ts", "vob",
    "3gp", "ogv", "rm", "rmvb", "asf",
];

fn assumed_kbps(file_name: &str) -> u32 {
    let video = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VIDEO_LIKE_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(e)));
    if video {
        VIDEO_ASSUMED_KBPS
    } else {
        AUDIO_ASSUMED_KBPS
    }
}

/// Never fails: the record is always `success = true` with a warning that
/// the numbers are approximate.
pub fn estimate(file_name: &str, file_size: u64, mut warnings: Vec<String>) -> MediaRecord {
    let kbps = assumed_kbps(file_name);
    let duration = file_size as f64 * 8.0 / (kbps as f64 * 1000.0);
    warnings.push(format!(
        "format not recognized; duration is approximate, assuming {kbps} kbps"
    ));
    tracing::debug!(file_name, file_size, kbps, "fallback estimate");
    MediaRecord {
        container: Container::Unknown,
        format: "unknown".to_string(),
        duration_seconds: duration,
        bitrate_kbps: kbps,
        streams: Vec::new(),
        tags: TagSet::new(),
        warnings,
        errors: Vec::new(),
        success: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_rate_by_default() {
        let rec = estimate("blob", 160_000, Vec::new());
        assert!(rec.success);
        assert_eq!(rec.bitrate_kbps, 128);
        assert!((rec.duration_seconds - 10.0).abs() < 1e-9);
        assert!(rec.warnings[0].contains("approximate"));
    }

    #[test]
    fn video_extension_uses_higher_rate() {
        let rec = estimate("clip.WMV", 2_500_000, Vec::new());
        assert_eq!(rec.bitrate_kbps, 2000);
        assert!((rec.duration_seconds - 10.0).abs() < 1e-9);
    }
}
