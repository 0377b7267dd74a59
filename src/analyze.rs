use crate::cursor::ParseCursor;
use crate::detect::{self, Detection, MediaFormat, HEAD_LEN};
use crate::fallback;
use crate::normalize::normalize;
use crate::readers::{self, MediaSource, ReadContext, DEFAULT_MAX_DEPTH};
use crate::record::MediaRecord;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, info};

/// Options for one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Skips detection and uses this format's reader.
    pub format_hint: Option<MediaFormat>,
    /// Deepest container nesting accepted before a file is rejected.
    pub max_depth: u32,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        AnalyzeOptions {
            format_hint: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl AnalyzeOptions {
    pub fn with_format_hint(mut self, format: MediaFormat) -> Self {
        self.format_hint = Some(format);
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Analyze the media file at `path`.
///
/// # Parameters
/// - `path`: file to read; its extension takes part in format detection
/// - `format_hint`: when set, detection is skipped and this format's reader runs
///
/// # Returns
/// A [`MediaRecord`]. This never fails: unreadable or malformed input yields a
/// record with `success == false` and a message in `errors`.
///
/// # Example
/// ```no_run
/// let rec = mediaprobe::analyze("song.flac", None);
/// if rec.success {
///     println!("{:.1}s", rec.duration_seconds);
/// }
/// ```
pub fn analyze(path: impl AsRef<Path>, format_hint: Option<MediaFormat>) -> MediaRecord {
    let opts = AnalyzeOptions {
        format_hint,
        ..AnalyzeOptions::default()
    };
    analyze_with(path, &opts)
}

/// Like [`analyze`], with every option spelled out.
pub fn analyze_with(path: impl AsRef<Path>, opts: &AnalyzeOptions) -> MediaRecord {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            let format = opts.format_hint.unwrap_or(MediaFormat::Unknown);
            return MediaRecord::failed(
                format.container(),
                format.label(),
                format!("cannot open {}: {e}", path.display()),
            );
        }
    };
    analyze_reader(&mut file, &name, opts)
}

/// Analyze any seekable source. `file_name` is only used for its extension.
pub fn analyze_reader<R: Read + Seek>(reader: &mut R, file_name: &str, opts: &AnalyzeOptions) -> MediaRecord {
    let source: &mut dyn MediaSource = reader;
    let mut cursor = match ParseCursor::new(source) {
        Ok(c) => c,
        Err(e) => {
            let format = opts.format_hint.unwrap_or(MediaFormat::Unknown);
            return MediaRecord::failed(format.container(), format.label(), e.to_string());
        }
    };
    let file_size = cursor.stream_len();

    let detection = match opts.format_hint {
        Some(format) => Detection {
            format,
            warnings: Vec::new(),
        },
        None => match cursor.peek_bytes(HEAD_LEN) {
            Ok(head) => detect::detect(file_name, &head),
            Err(e) => return MediaRecord::failed(MediaFormat::Unknown.container(), "unknown", e.to_string()),
        },
    };
    let Detection { format, warnings } = detection;

    let Some(read) = readers::reader_for(format.family()) else {
        return fallback::estimate(file_name, file_size, warnings);
    };

    let ctx = ReadContext {
        format,
        max_depth: opts.max_depth,
    };
    debug!(file_name, %format, file_size, "reading");
    let parsed = read(&mut cursor, &ctx);
    let record = normalize(format, file_size, parsed, warnings);
    info!(
        file_name,
        format = %record.format,
        duration = record.duration_seconds,
        streams = record.streams.len(),
        success = record.success,
        "analyzed"
    );
    record
}
