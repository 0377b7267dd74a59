pub mod analyze;
pub mod codecs;
pub mod cursor;
pub mod detect;
pub mod error;
pub mod fallback;
pub mod fourcc;
pub mod normalize;
pub mod readers;
pub mod record;
pub mod tags;
pub mod vint;

pub use analyze::{AnalyzeOptions, analyze, analyze_reader, analyze_with};
pub use detect::{ContainerFamily, MediaFormat};
pub use error::ParseError;
pub use fourcc::FourCC;
pub use record::{Container, MediaRecord, StreamDescriptor, StreamKind, TagKey, TagSet};
