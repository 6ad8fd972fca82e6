//! Resource directory tree walker.
//!
//! The resource directory is three levels deep: type, name and language.
//! Each directory is a fixed header followed by its named entries and then
//! its ID entries. An entry points either at another directory or, at the
//! language level, at a data entry describing the resource payload.

use std::collections::HashSet;

use object::pe::{
    ImageResourceDataEntry, ImageResourceDirectory, ImageResourceDirectoryEntry,
    IMAGE_RESOURCE_DATA_IS_DIRECTORY,
};
use object::{LittleEndian as LE, ReadRef};

use crate::error::ResourceError;

/// Type, name and language.
const LEVELS: usize = 3;

const DIRECTORY_SIZE: u64 = size_of::<ImageResourceDirectory>() as u64;

/// A leaf of the resource tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataEntry {
    /// RVA of the payload. Unlike the directory offsets this is image-relative.
    pub rva: u32,
    pub size: u32,
    pub code_page: u32,
}

/// A directory entry waiting on the stack, checked only when it is reached.
#[derive(Debug, Clone, Copy)]
struct Node {
    level: usize,
    offset: u32,
    parent: Option<u32>,
    is_directory: bool,
}

/// Finds the first resource of numeric type `type_id`.
///
/// Name and language are not negotiated: the first leaf reached in directory
/// order wins, backtracking past empty subdirectories. Every offset must point
/// past its parent and each directory may only be visited once, so malformed
/// trees fail instead of looping. Entries are validated when the walk reaches
/// them, so a bad sibling after the winning leaf is never looked at.
pub fn find_leaf(block: &[u8], type_id: u16) -> Result<Option<DataEntry>, ResourceError> {
    let mut stack = vec![Node {
        level: 0,
        offset: 0,
        parent: None,
        is_directory: true,
    }];
    let mut visited = HashSet::new();

    while let Some(node) = stack.pop() {
        let offset = node.offset;
        if node.parent.is_some_and(|parent| offset <= parent) {
            return Err(ResourceError::CyclicOffset(offset));
        }
        if !visited.insert(offset) {
            return Err(ResourceError::SharedOffset(offset));
        }

        match (node.is_directory, node.level < LEVELS) {
            (true, true) => {}
            (false, false) => return read_data_entry(block, offset).map(Some),
            (true, false) => return Err(ResourceError::TooDeep(offset)),
            (false, true) => return Err(ResourceError::UnexpectedLeaf(node.level)),
        }

        let entries = read_entries(block, offset)?;
        for entry in entries.iter().rev() {
            // Named type entries never match a numeric type.
            if node.level == 0 && entry.name_or_id.get(LE) != u32::from(type_id) {
                continue;
            }

            let target = entry.offset_to_data_or_directory.get(LE);
            stack.push(Node {
                level: node.level + 1,
                offset: target & !IMAGE_RESOURCE_DATA_IS_DIRECTORY,
                parent: Some(offset),
                is_directory: target & IMAGE_RESOURCE_DATA_IS_DIRECTORY != 0,
            });
        }
    }

    Ok(None)
}

fn read_entries(block: &[u8], offset: u32) -> Result<&[ImageResourceDirectoryEntry], ResourceError> {
    let header: &ImageResourceDirectory = block
        .read_at(u64::from(offset))
        .map_err(|_| out_of_bounds(block, offset))?;
    let count = usize::from(header.number_of_named_entries.get(LE))
        + usize::from(header.number_of_id_entries.get(LE));

    block
        .read_slice_at(u64::from(offset) + DIRECTORY_SIZE, count)
        .map_err(|_| out_of_bounds(block, offset))
}

fn read_data_entry(block: &[u8], offset: u32) -> Result<DataEntry, ResourceError> {
    let entry: &ImageResourceDataEntry = block
        .read_at(u64::from(offset))
        .map_err(|_| out_of_bounds(block, offset))?;

    Ok(DataEntry {
        rva: entry.offset_to_data.get(LE),
        size: entry.size.get(LE),
        code_page: entry.code_page.get(LE),
    })
}

fn out_of_bounds(block: &[u8], offset: u32) -> ResourceError {
    ResourceError::OutOfBounds {
        offset: offset as usize,
        size: block.len(),
    }
}
