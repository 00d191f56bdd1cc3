use std::{fmt, io};
use thiserror::Error;

pub type ResourcesResult<T> = Result<T, ResourcesError>;

#[derive(Debug, Error)]
pub enum ResourcesError {
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    #[error("Format error: {0}")]
    Fmt(#[from] fmt::Error),

    /// Low level parsing failure, with the number of input bytes that were
    /// left when the parser gave up.
    #[error("parsing error ({1:?}) with {0} bytes remaining")]
    Parsing(usize, nom::error::ErrorKind),

    /// Malformed or truncated chunk, bad chunk type, out of bounds offset.
    #[error("malformed resources: {0}")]
    Format(String),

    /// A symbolic name has no numeric mapping at encode time.
    #[error("cannot resolve '{name}' ({location})")]
    Resolution { location: String, name: String },

    /// A numeric identifier is unknown to every available table.
    #[error("unknown resource id {0:#010x}")]
    UnknownResource(u32),

    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("invalid UTF-16: {0}")]
    InvalidUtf16(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResourcesError {
    /// Errors that mean the input bytes are not a valid chunk tree.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::Parsing(..) | Self::Format(_) | Self::InvalidUtf8(_) | Self::InvalidUtf16(_)
        )
    }
}

impl nom::error::ParseError<&[u8]> for ResourcesError {
    fn from_error_kind(input: &[u8], kind: nom::error::ErrorKind) -> Self {
        Self::Parsing(input.len(), kind)
    }

    fn append(_: &[u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}
