//! Error types for probing PE files.

use std::io;

use object::FileKind;
use thiserror::Error;

/// The probe phase an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Envelope,
    Imports,
    Resources,
}

/// Errors returned by [`probe`](crate::probe) and friends.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),

    #[error("not a parseable PE file: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("while parsing imported libraries: {0}")]
    Imports(#[source] object::Error),

    #[error("while parsing resources: {0}")]
    Resources(#[source] ResourceError),
}

impl ProbeError {
    /// Returns the phase that failed.
    pub fn phase(&self) -> Phase {
        match self {
            ProbeError::Io(_) | ProbeError::Envelope(_) => Phase::Envelope,
            ProbeError::Imports(_) => Phase::Imports,
            ProbeError::Resources(_) => Phase::Resources,
        }
    }
}

/// The container itself could not be parsed.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("unsupported binary format: {0:?}")]
    UnsupportedFormat(FileKind),

    #[error(transparent)]
    Malformed(#[from] object::Error),
}

/// Malformed resource directory or version record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("offset {offset:#x} out of bounds (size: {size:#x})")]
    OutOfBounds { offset: usize, size: usize },

    #[error("directory offset {0:#x} does not point past its parent")]
    CyclicOffset(u32),

    #[error("directory offset {0:#x} is referenced more than once")]
    SharedOffset(u32),

    #[error("unexpected data entry at directory level {0}")]
    UnexpectedLeaf(usize),

    #[error("directory nested deeper than three levels at offset {0:#x}")]
    TooDeep(u32),

    #[error("resource section data is unreadable: {0}")]
    Section(#[source] object::Error),

    #[error("resource table RVA {0:#x} lies past its section's raw data")]
    TableOutOfSection(u32),

    #[error("data entry RVA {rva:#x} (size {size:#x}) is not backed by any section")]
    UnmappedData { rva: u32, size: u32 },

    #[error("invalid version record at {offset:#x}: {reason}")]
    Record { offset: usize, reason: &'static str },

    #[error("unexpected version root key {0:?}")]
    RootKey(String),
}
