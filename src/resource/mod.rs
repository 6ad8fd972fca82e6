//! Resource directory location and version resource extraction.

mod tree;
mod version;

pub use tree::{find_leaf, DataEntry};
pub use version::{decode_version_info, FixedFileInfo, StringTableId, VersionInfo};

use log::debug;
use object::ReadRef;

use crate::binary::Envelope;
use crate::error::ResourceError;

/// Index of the resource table in the data directory array.
pub const RESOURCE_TABLE_INDEX: usize = object::pe::IMAGE_DIRECTORY_ENTRY_RESOURCE;

/// Name of the section conventionally holding the resource directory.
pub const RESOURCE_SECTION: &str = ".rsrc";

/// Raw bytes of the resource directory and the RVA they start at.
///
/// Every offset inside the directory tree is relative to `data[0]`.
#[derive(Debug, Clone, Copy)]
pub struct ResourceBlock<'data> {
    pub data: &'data [u8],
    pub virtual_address: u32,
}

impl<'data> ResourceBlock<'data> {
    /// Returns the payload of a data entry when it lies inside this block.
    pub fn payload(&self, entry: &DataEntry) -> Option<&'data [u8]> {
        let start = entry.rva.checked_sub(self.virtual_address)? as usize;
        let end = start.checked_add(entry.size as usize)?;
        self.data.get(start..end)
    }
}

/// Finds the resource directory, by section name first and the data directory second.
///
/// Returns `Ok(None)` when the image has no resources; that is not an error.
/// A resource section that is present but cannot be read is.
pub fn locate<'data, R: ReadRef<'data>>(
    envelope: &Envelope<'data, R>,
) -> Result<Option<ResourceBlock<'data>>, ResourceError> {
    if let Some(section) = envelope
        .section_by_name(RESOURCE_SECTION)
        .map_err(ResourceError::Section)?
    {
        debug!(
            "Using {} section at {:#x} ({:#x} bytes)",
            RESOURCE_SECTION,
            section.virtual_address,
            section.data.len()
        );
        return Ok(Some(ResourceBlock {
            data: section.data,
            virtual_address: section.virtual_address,
        }));
    }

    let directory = envelope.data_directories()[RESOURCE_TABLE_INDEX];
    if directory.virtual_address == 0 {
        debug!("No {} section and no resource table", RESOURCE_SECTION);
        return Ok(None);
    }

    let Some(section) = envelope
        .section_containing_rva(directory.virtual_address)
        .map_err(ResourceError::Section)?
    else {
        debug!(
            "Resource table RVA {:#x} is not inside any section",
            directory.virtual_address
        );
        return Ok(None);
    };

    // The directory does not have to start at the beginning of its section.
    let start = (directory.virtual_address - section.virtual_address) as usize;
    let data = section
        .data
        .get(start..)
        .ok_or(ResourceError::TableOutOfSection(directory.virtual_address))?;
    debug!(
        "Using resource table at {:#x} in section {:?}",
        directory.virtual_address,
        String::from_utf8_lossy(section.name)
    );

    Ok(Some(ResourceBlock {
        data,
        virtual_address: directory.virtual_address,
    }))
}

/// Finds the first `RT_VERSION` resource and decodes it into `info`.
///
/// Pairs from string tables that decoded completely stay in `info` even when
/// a later part of the resource turns out to be malformed.
pub fn read_version_info<'data, R: ReadRef<'data>>(
    envelope: &Envelope<'data, R>,
    block: &ResourceBlock<'data>,
    info: &mut VersionInfo,
) -> Result<(), ResourceError> {
    let Some(entry) = find_leaf(block.data, object::pe::RT_VERSION)? else {
        debug!("No version resource present");
        return Ok(());
    };

    let payload = match block.payload(&entry) {
        Some(payload) => Some(payload),
        None => envelope
            .section_containing_rva(entry.rva)
            .map_err(ResourceError::Section)?
            .and_then(|section| section.slice_at_rva(entry.rva, entry.size)),
    };
    let payload = payload.ok_or(ResourceError::UnmappedData {
        rva: entry.rva,
        size: entry.size,
    })?;

    decode_version_info(payload, info)
}
