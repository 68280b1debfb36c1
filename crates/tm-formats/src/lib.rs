//! Format parsers for tmodplay.
//!
//! Parses Protracker-compatible MOD files into a [`tm_ir::Track`].

mod cp437;
mod mod_format;

pub use cp437::decode_cp437;
pub use mod_format::{load_mod, HEADER_SIZE};

/// Error type for format parsing.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Buffer shorter than the fixed MOD header
    #[error("not a MOD file: {0} bytes is shorter than the header")]
    TooShort(usize),
    /// Signature at offset 1080 not recognised
    #[error("not a MOD file or unrecognized MOD format (tag: {})", String::from_utf8_lossy(.0))]
    UnknownTag([u8; 4]),
    /// File ends inside the pattern data
    #[error("incomplete pattern data: need {expected} bytes, file has {actual}")]
    IncompletePatternData { expected: usize, actual: usize },
    /// Header fields could not be decoded
    #[error("malformed header: {0}")]
    Header(#[from] binrw::Error),
}
