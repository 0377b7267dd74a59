use std::fmt;

/// Four-character code naming a RIFF chunk, ISO box or codec.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }

    pub fn from_slice(b: &[u8]) -> Option<Self> {
        if b.len() >= 4 {
            Some(FourCC([b[0], b[1], b[2], b[3]]))
        } else {
            None
        }
    }

    /// True when all four bytes are printable ASCII, which is how chunk and
    /// box identifiers are written in practice.
    pub fn is_printable(&self) -> bool {
        self.0.iter().all(|c| (32..=126).contains(c))
    }

    /// The code as text; codes with non-printable bytes are rendered as hex.
    pub fn to_display_string(&self) -> String {
        if self.is_printable() {
            self.0.iter().map(|&c| c as char).collect()
        } else {
            format!("0x{}", hex::encode(self.0))
        }
    }

    /// The code with trailing spaces and NULs removed, as used for codec lookup.
    pub fn trimmed(&self) -> String {
        self.to_display_string()
            .trim_end_matches([' ', '\0'])
            .to_string()
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}
