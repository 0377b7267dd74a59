//! Container readers, one per family.
//!
//! Every reader has the same shape: it walks its family's structure through a
//! [`ParseCursor`] and returns an immutable raw-fields value together with the
//! warnings it collected and, if the walk stopped early, the error that
//! stopped it. Whatever was captured before the error is kept.

pub mod ebml;
pub mod flac;
pub mod flv;
pub mod iso;
pub mod mpeg;
pub mod ogg;
pub mod riff;

use crate::cursor::ParseCursor;
use crate::detect::{ContainerFamily, MediaFormat};
use crate::error::ParseError;
use std::io::{Read, Seek};

/// Default cap on container nesting.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Any seekable byte source.
pub trait MediaSource: Read + Seek {}
impl<T: Read + Seek> MediaSource for T {}

pub type SourceCursor<'a> = ParseCursor<&'a mut dyn MediaSource>;

pub type ReaderFn = fn(&mut SourceCursor<'_>, &ReadContext) -> Parsed<RawFields>;

/// Per-call settings passed to every reader.
#[derive(Debug, Clone)]
pub struct ReadContext {
    pub format: MediaFormat,
    pub max_depth: u32,
}

/// A reader's output.
#[derive(Debug)]
pub struct Parsed<T> {
    pub raw: T,
    pub warnings: Vec<String>,
    pub error: Option<ParseError>,
}

impl<T> Parsed<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        Parsed {
            raw: f(self.raw),
            warnings: self.warnings,
            error: self.error,
        }
    }
}

/// Raw fields in each family's own vocabulary, before normalization.
#[derive(Debug, Clone)]
pub enum RawFields {
    Riff(riff::RiffRaw),
    Iso(iso::IsoRaw),
    Ogg(ogg::OggRaw),
    Flac(flac::FlacRaw),
    Ebml(ebml::EbmlRaw),
    Mpeg(mpeg::MpegRaw),
    Flv(flv::FlvRaw),
    Unknown,
}

static READERS: &[(ContainerFamily, ReaderFn)] = &[
    (ContainerFamily::Riff, riff::read),
    (ContainerFamily::IsoBmff, iso::read),
    (ContainerFamily::Ogg, ogg::read),
    (ContainerFamily::Flac, flac::read),
    (ContainerFamily::Ebml, ebml::read),
    (ContainerFamily::Mpeg, mpeg::read),
    (ContainerFamily::Flv, flv::read),
];

/// Reader registered for `family`, or `None` for [`ContainerFamily::Unknown`].
pub fn reader_for(family: ContainerFamily) -> Option<ReaderFn> {
    READERS
        .iter()
        .find(|(f, _)| *f == family)
        .map(|(_, r)| *r)
}

/// Error raised when nesting exceeds the configured limit.
pub(crate) fn depth_exceeded(offset: u64, max_depth: u32) -> ParseError {
    ParseError::malformed(offset, format!("nesting deeper than {max_depth} levels"))
}
