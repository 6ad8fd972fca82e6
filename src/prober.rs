//! Probe orchestration: envelope, imports, then version resources.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use log::{debug, warn};
use memmap2::Mmap;
use object::read::ReadCache;
use object::ReadRef;

use crate::binary::{Architecture, Envelope};
use crate::error::ProbeError;
use crate::resource::{self, FixedFileInfo, StringTableId, VersionInfo};

/// How recoverable failures are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Return import and resource errors instead of logging them and
    /// continuing with an empty result for that part.
    pub strict: bool,
}

impl ProbeOptions {
    /// Options that turn import and resource errors into hard failures.
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// Metadata extracted from a PE file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub architecture: Architecture,
    /// Imported DLL names in import directory order, duplicates included.
    pub imports: Vec<String>,
    pub version_properties: BTreeMap<String, String>,
    pub fixed_file_info: Option<FixedFileInfo>,
    pub string_tables: Vec<StringTableId>,
}

/// Probes an open file through a read-only memory map.
pub fn probe(file: &File, options: ProbeOptions) -> Result<ProbeResult, ProbeError> {
    // SAFETY: the map is read-only and dropped before returning; the caller
    // must not truncate the file while it is being probed.
    let mmap = unsafe { Mmap::map(file)? };
    Prober::new(options).probe(&*mmap)
}

/// Probes any seekable stream, reading only the ranges that are needed.
///
/// A failing read or seek is returned as [`ProbeError::Io`] in both modes,
/// even when it happened in a phase that lenient mode would otherwise skip.
pub fn probe_reader<R: Read + Seek>(reader: R, options: ProbeOptions) -> Result<ProbeResult, ProbeError> {
    let mut reader = IoErrorTrap::new(reader);
    let result = {
        let cache = ReadCache::new(&mut reader);
        Prober::new(options).probe(&cache)
    };

    match reader.error.take() {
        Some(err) => Err(ProbeError::Io(err)),
        None => result,
    }
}

/// Probes an in-memory image.
pub fn probe_bytes(data: &[u8], options: ProbeOptions) -> Result<ProbeResult, ProbeError> {
    Prober::new(options).probe(data)
}

/// Runs the probe phases with a fixed set of options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Prober {
    options: ProbeOptions,
}

impl Prober {
    /// Creates a prober that applies `options` to every image it reads.
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    /// Probes `data`. Only envelope errors are fatal in lenient mode.
    pub fn probe<'data, R: ReadRef<'data>>(&self, data: R) -> Result<ProbeResult, ProbeError> {
        let envelope = Envelope::open(data)?;
        let machine = envelope.machine_type();
        debug!(
            "Parsed {} image, machine {:?}",
            if envelope.is_64() { "PE32+" } else { "PE32" },
            machine
        );

        let imports = self.harvest_imports(&envelope)?;
        let version = self.read_version(&envelope)?;

        Ok(ProbeResult {
            architecture: machine.architecture(),
            imports,
            version_properties: version.properties,
            fixed_file_info: version.fixed,
            string_tables: version.tables,
        })
    }

    fn harvest_imports<'data, R: ReadRef<'data>>(
        &self,
        envelope: &Envelope<'data, R>,
    ) -> Result<Vec<String>, ProbeError> {
        match envelope.imported_library_names() {
            Ok(imports) => Ok(imports),
            Err(err) if self.options.strict => Err(ProbeError::Imports(err)),
            Err(err) => {
                warn!("Could not parse imported libraries: {err}");
                Ok(Vec::new())
            }
        }
    }

    fn read_version<'data, R: ReadRef<'data>>(
        &self,
        envelope: &Envelope<'data, R>,
    ) -> Result<VersionInfo, ProbeError> {
        let mut version = VersionInfo::default();

        let outcome = resource::locate(envelope).and_then(|block| match block {
            Some(block) => resource::read_version_info(envelope, &block, &mut version),
            // Many images simply have no resources.
            None => Ok(()),
        });

        match outcome {
            Ok(()) => Ok(version),
            Err(err) if self.options.strict => Err(ProbeError::Resources(err)),
            Err(err) => {
                warn!("Could not parse resources: {err}");
                Ok(version)
            }
        }
    }
}

/// Remembers the first I/O error of the wrapped stream.
///
/// `ReadCache` turns every failed read into an out-of-bounds access and drops
/// the underlying error.
struct IoErrorTrap<R> {
    inner: R,
    error: Option<io::Error>,
}

impl<R> IoErrorTrap<R> {
    fn new(inner: R) -> Self {
        Self { inner, error: None }
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(err) = &result {
            if err.kind() != io::ErrorKind::Interrupted && self.error.is_none() {
                self.error = Some(io::Error::new(err.kind(), err.to_string()));
            }
        }
        result
    }
}

impl<R: Read> Read for IoErrorTrap<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        self.record(result)
    }
}

impl<R: Seek> Seek for IoErrorTrap<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let result = self.inner.seek(pos);
        self.record(result)
    }
}
