use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported format")]
    UnsupportedFormat,
    #[error("malformed structure at offset {offset}: {reason}")]
    Malformed { offset: u64, reason: String },
    #[error("truncated input at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },
}

pub type Result<T> = std::result::Result<T, ParseError>;

impl ParseError {
    pub fn malformed(offset: u64, reason: impl fmt::Display) -> Self {
        ParseError::Malformed {
            offset,
            reason: reason.to_string(),
        }
    }

    pub fn truncated(offset: u64, needed: u64, available: u64) -> Self {
        ParseError::Truncated {
            offset,
            needed,
            available,
        }
    }

    pub fn is_truncation(&self) -> bool {
        match self {
            ParseError::Truncated { .. } => true,
            ParseError::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
