//! Error types for container parsing and validation runs.
//!
//! Only structural problems are errors. A file whose header, chunk table and
//! metadata parse cleanly always produces a result, even when individual
//! primitives cannot be read; those problems are reported as
//! [`Diagnostic`](crate::position_extractor::Diagnostic)s instead.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Structural defects in the binary envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// Input is shorter than the header or does not start with `glTF`.
    #[error("bad magic")]
    BadMagic,

    /// A chunk declares more data than the input holds.
    #[error("truncated chunk: chunk {index} at offset {offset} declares {declared} bytes, {available} available")]
    TruncatedChunk {
        index: usize,
        offset: usize,
        declared: u32,
        available: usize,
    },

    /// The first chunk is absent or is not tagged `JSON`.
    #[error("missing metadata chunk")]
    MissingMetadataChunk,
}

/// Which input of a comparison an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Original,
    Candidate,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Original => write!(f, "original"),
            Side::Candidate => write!(f, "candidate"),
        }
    }
}

/// Errors that abort validation of a file.
#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("malformed container: {0}")]
    MalformedContainer(#[from] ContainerError),

    #[error("invalid scene description: {0}")]
    InvalidSceneDescription(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A structural error attributed to one side of a comparison.
    #[error("{side} file: {source}")]
    Input {
        side: Side,
        #[source]
        source: Box<ValidateError>,
    },
}

impl ValidateError {
    /// Attach the side of the comparison this error came from.
    pub fn for_side(self, side: Side) -> Self {
        ValidateError::Input {
            side,
            source: Box::new(self),
        }
    }

    /// The innermost error, with any side labels removed.
    pub fn root(&self) -> &ValidateError {
        match self {
            ValidateError::Input { source, .. } => source.root(),
            other => other,
        }
    }
}

/// An external decoder could not produce positions for a compressed primitive.
///
/// This is recoverable: the affected mesh is reported as undecodable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("decode unavailable: {reason}")]
pub struct DecodeUnavailable {
    pub reason: String,
}

impl DecodeUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidateError>;
