//! Everything that can go wrong before any projection work is dispatched.
//!
//! All variants are detected eagerly, on the caller's thread: the parallel
//! kernels themselves cannot fail.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed geometry description: mismatched sequence lengths,
    /// a too-small field size, or non-finite ray positions.
    InvalidGeometry(String),

    /// Array dimensions do not agree with the geometry or with each other.
    ShapeMismatch { expected: String, found: String },

    /// Custom filter length differs from the projection row length.
    FilterLengthMismatch { expected: usize, found: usize },

    /// The requested execution context is not available in this build.
    UnsupportedExecutionContext(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidGeometry(why) =>
                write!(f, "invalid geometry: {why}"),
            Error::ShapeMismatch { expected, found } =>
                write!(f, "shape mismatch: expected {expected}, found {found}"),
            Error::FilterLengthMismatch { expected, found } =>
                write!(f, "filter length mismatch: projection rows have {expected} elements, filter has {found}"),
            Error::UnsupportedExecutionContext(which) =>
                write!(f, "unsupported execution context: {which}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
