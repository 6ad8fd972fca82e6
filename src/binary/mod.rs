//! Structural access to the PE container.
//!
//! This module wraps the `object` crate's PE reader behind a single
//! [`Envelope`] type so callers never have to care whether the image carries
//! a 32-bit or a 64-bit optional header.

mod pe;

use object::read::pe::{PeFile32, PeFile64};
use object::{FileKind, ReadRef};

use crate::error::EnvelopeError;

/// Number of entries in the optional header's data directory array.
pub const DATA_DIRECTORY_COUNT: usize = 16;

/// Machine type from the COFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    I386,
    Amd64,
    Other(u16),
}

impl Machine {
    /// Classifies a raw `IMAGE_FILE_MACHINE_*` value.
    pub fn from_raw(machine: u16) -> Self {
        match machine {
            object::pe::IMAGE_FILE_MACHINE_I386 => Machine::I386,
            object::pe::IMAGE_FILE_MACHINE_AMD64 => Machine::Amd64,
            other => Machine::Other(other),
        }
    }

    /// Maps the machine type to a probe architecture; unknown machines map to `Unknown`.
    pub fn architecture(self) -> Architecture {
        match self {
            Machine::I386 => Architecture::X86,
            Machine::Amd64 => Architecture::Amd64,
            Machine::Other(_) => Architecture::Unknown,
        }
    }
}

/// CPU architecture reported in a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Architecture {
    X86,
    Amd64,
    #[default]
    Unknown,
}

impl Architecture {
    /// Short architecture name: `"386"`, `"amd64"`, or empty when unknown.
    pub fn as_str(self) -> &'static str {
        match self {
            Architecture::X86 => "386",
            Architecture::Amd64 => "amd64",
            Architecture::Unknown => "",
        }
    }
}

/// A data directory entry from the optional header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

/// A section's raw bytes together with its virtual address.
#[derive(Debug, Clone, Copy)]
pub struct Section<'data> {
    pub name: &'data [u8],
    pub virtual_address: u32,
    pub data: &'data [u8],
}

impl<'data> Section<'data> {
    /// Returns `size` bytes starting at `rva`, if they lie inside this section.
    pub fn slice_at_rva(&self, rva: u32, size: u32) -> Option<&'data [u8]> {
        let start = rva.checked_sub(self.virtual_address)? as usize;
        let end = start.checked_add(size as usize)?;
        self.data.get(start..end)
    }
}

/// A parsed PE container, either PE32 or PE32+.
pub enum Envelope<'data, R: ReadRef<'data> = &'data [u8]> {
    Pe32(PeFile32<'data, R>),
    Pe64(PeFile64<'data, R>),
}

impl<'data, R: ReadRef<'data>> Envelope<'data, R> {
    /// Parses the container headers and section table.
    pub fn open(data: R) -> Result<Self, EnvelopeError> {
        match FileKind::parse(data)? {
            FileKind::Pe32 => Ok(Envelope::Pe32(PeFile32::parse(data)?)),
            FileKind::Pe64 => Ok(Envelope::Pe64(PeFile64::parse(data)?)),
            other => Err(EnvelopeError::UnsupportedFormat(other)),
        }
    }

    /// Returns `true` for PE32+ images.
    pub fn is_64(&self) -> bool {
        matches!(self, Envelope::Pe64(_))
    }

    /// Returns the machine type from the COFF file header.
    pub fn machine_type(&self) -> Machine {
        match self {
            Envelope::Pe32(file) => pe::machine(file),
            Envelope::Pe64(file) => pe::machine(file),
        }
    }

    /// Returns the 16 data directories, whichever optional header layout is present.
    pub fn data_directories(&self) -> [DataDirectory; DATA_DIRECTORY_COUNT] {
        match self {
            Envelope::Pe32(file) => pe::data_directories(file),
            Envelope::Pe64(file) => pe::data_directories(file),
        }
    }

    /// Finds a section by exact name. Fails if the section exists but its raw data cannot be read.
    pub fn section_by_name(&self, name: &str) -> object::Result<Option<Section<'data>>> {
        match self {
            Envelope::Pe32(file) => pe::section_by_name(file, name),
            Envelope::Pe64(file) => pe::section_by_name(file, name),
        }
    }

    /// Finds the section mapping `rva`. Fails if its raw data cannot be read.
    pub fn section_containing_rva(&self, rva: u32) -> object::Result<Option<Section<'data>>> {
        match self {
            Envelope::Pe32(file) => pe::section_containing_rva(file, rva),
            Envelope::Pe64(file) => pe::section_containing_rva(file, rva),
        }
    }

    /// Returns the DLL names referenced by the import directory, in table order.
    pub fn imported_library_names(&self) -> object::Result<Vec<String>> {
        match self {
            Envelope::Pe32(file) => pe::imported_library_names(file),
            Envelope::Pe64(file) => pe::imported_library_names(file),
        }
    }
}
