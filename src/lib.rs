//! PE metadata probe library.
//!
//! This library extracts the target architecture, imported libraries and
//! version resource properties from Portable Executable files without
//! loading or executing them.

pub mod binary;
pub mod error;
pub mod prober;
pub mod resource;

pub use binary::{Architecture, Envelope, Machine};
pub use error::{EnvelopeError, Phase, ProbeError, ResourceError};
pub use prober::{probe, probe_bytes, probe_reader, ProbeOptions, ProbeResult, Prober};
pub use resource::{FixedFileInfo, StringTableId, VersionInfo};
