//! `VS_VERSIONINFO` decoder.
//!
//! A version resource is a tree of records. Each record starts with a
//! 6-byte header (total length, value length, value type), followed by a
//! NUL-terminated UTF-16LE key, padding to a 4-byte boundary, the value,
//! more padding, and then its children back to back. Alignment is relative
//! to the start of the resource.

use std::collections::BTreeMap;

use log::debug;

use crate::error::ResourceError;

const HEADER_SIZE: usize = 6;

const ROOT_KEY: &str = "VS_VERSION_INFO";
const STRING_FILE_INFO: &str = "StringFileInfo";
const VAR_FILE_INFO: &str = "VarFileInfo";

/// `wType` of records whose value is text.
const TEXT_VALUE: u16 = 1;

const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
const FIXED_FILE_INFO_SIZE: usize = 52;

/// Decoded contents of a version resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub fixed: Option<FixedFileInfo>,
    /// Properties from every string table, e.g. `CompanyName` or `ProductVersion`.
    pub properties: BTreeMap<String, String>,
    /// Language and code page of each string table that decoded completely.
    pub tables: Vec<StringTableId>,
}

/// The binary `VS_FIXEDFILEINFO` value of the root record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFileInfo {
    pub file_version: [u16; 4],
    pub product_version: [u16; 4],
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    pub file_date: u64,
}

impl FixedFileInfo {
    fn parse(value: &[u8]) -> Option<Self> {
        if value.len() < FIXED_FILE_INFO_SIZE || read_u32(value, 0)? != FIXED_FILE_INFO_SIGNATURE {
            return None;
        }

        let quad = |offset| -> Option<[u16; 4]> {
            let ms = read_u32(value, offset)?;
            let ls = read_u32(value, offset + 4)?;
            Some([(ms >> 16) as u16, ms as u16, (ls >> 16) as u16, ls as u16])
        };

        Some(Self {
            file_version: quad(8)?,
            product_version: quad(16)?,
            file_flags_mask: read_u32(value, 24)?,
            file_flags: read_u32(value, 28)?,
            file_os: read_u32(value, 32)?,
            file_type: read_u32(value, 36)?,
            file_subtype: read_u32(value, 40)?,
            file_date: (u64::from(read_u32(value, 44)?) << 32) | u64::from(read_u32(value, 48)?),
        })
    }

    /// File version as dotted quad, e.g. `1.2.3.0`.
    pub fn file_version_string(&self) -> String {
        dotted(&self.file_version)
    }

    /// Product version as dotted quad.
    pub fn product_version_string(&self) -> String {
        dotted(&self.product_version)
    }
}

fn dotted(quad: &[u16; 4]) -> String {
    format!("{}.{}.{}.{}", quad[0], quad[1], quad[2], quad[3])
}

/// Language and code page of a `StringTable`, parsed from its 8-hex-digit key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTableId {
    pub language: u16,
    pub code_page: u16,
}

impl StringTableId {
    fn parse(key: &str) -> Option<Self> {
        if key.len() != 8 || !key.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self {
            language: u16::from_str_radix(&key[..4], 16).ok()?,
            code_page: u16::from_str_radix(&key[4..], 16).ok()?,
        })
    }
}

/// One parsed record header. `children` spans the bytes after the value.
#[derive(Debug)]
struct Record<'a> {
    offset: usize,
    key: String,
    value_type: u16,
    value_length: u16,
    value: &'a [u8],
    children: Children<'a>,
}

impl<'a> Record<'a> {
    /// Parses the record at `offset`, which must end at or before `limit`.
    fn parse(data: &'a [u8], offset: usize, limit: usize) -> Result<Self, ResourceError> {
        let malformed = |reason| ResourceError::Record { offset, reason };

        let length = read_u16(data, offset).ok_or(malformed("truncated header"))? as usize;
        let value_length = read_u16(data, offset + 2).ok_or(malformed("truncated header"))?;
        let value_type = read_u16(data, offset + 4).ok_or(malformed("truncated header"))?;

        if length < HEADER_SIZE {
            return Err(malformed("length shorter than header"));
        }
        let end = offset + length;
        if end > limit || end > data.len() {
            return Err(malformed("length exceeds parent"));
        }

        let record = &data[..end];
        let (key, key_end) =
            read_utf16z(record, offset + HEADER_SIZE).ok_or(malformed("unterminated key"))?;

        let value_start = align4(key_end).min(end);
        let (value, value_end) = if value_type == TEXT_VALUE {
            // Text lengths count UTF-16 units, but some writers store bytes.
            let wanted = usize::from(value_length) * 2;
            if value_start + wanted <= end {
                (&record[value_start..value_start + wanted], value_start + wanted)
            } else {
                let (_, text_end) = read_utf16z(record, value_start)
                    .ok_or(malformed("value overruns record"))?;
                (&record[value_start..text_end], text_end)
            }
        } else {
            let wanted = usize::from(value_length);
            if value_start + wanted > end {
                return Err(malformed("value overruns record"));
            }
            (&record[value_start..value_start + wanted], value_start + wanted)
        };

        Ok(Self {
            offset,
            key,
            value_type,
            value_length,
            value,
            children: Children {
                data,
                offset: align4(value_end),
                end,
            },
        })
    }

    /// The value as text, cut at the first NUL.
    fn text(&self) -> String {
        let units: Vec<u16> = self
            .value
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        String::from_utf16_lossy(&units)
    }
}

/// Iterator over the child records between `offset` and `end`.
///
/// Stops after the first malformed child.
#[derive(Debug)]
struct Children<'a> {
    data: &'a [u8],
    offset: usize,
    end: usize,
}

impl<'a> Iterator for Children<'a> {
    type Item = Result<Record<'a>, ResourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = align4(self.offset);
        // Anything shorter than a header is trailing padding.
        if offset + HEADER_SIZE > self.end {
            return None;
        }

        match Record::parse(self.data, offset, self.end) {
            Ok(record) => {
                self.offset = record.children.end;
                Some(Ok(record))
            }
            Err(err) => {
                self.offset = self.end;
                Some(Err(err))
            }
        }
    }
}

/// Decodes a version resource into `info`.
///
/// The fixed info and the pairs of each string table are committed to `info`
/// only once they have decoded completely, so an error never leaves half a
/// table behind.
pub fn decode_version_info(data: &[u8], info: &mut VersionInfo) -> Result<(), ResourceError> {
    let root = Record::parse(data, 0, data.len())?;
    if root.key != ROOT_KEY {
        return Err(ResourceError::RootKey(root.key));
    }

    if root.value_length > 0 {
        info.fixed = FixedFileInfo::parse(root.value);
        if info.fixed.is_none() {
            debug!("Ignoring unrecognized fixed file info ({} bytes)", root.value.len());
        }
    }

    for child in root.children {
        let child = child?;
        if child.key == STRING_FILE_INFO {
            decode_string_file_info(child, info)?;
        } else if child.key != VAR_FILE_INFO {
            debug!("Skipping version block {:?} at {:#x}", child.key, child.offset);
        }
    }

    Ok(())
}

fn decode_string_file_info(block: Record<'_>, info: &mut VersionInfo) -> Result<(), ResourceError> {
    for table in block.children {
        let table = table?;
        let Some(id) = StringTableId::parse(&table.key) else {
            debug!("Skipping string table with key {:?}", table.key);
            continue;
        };

        let mut pairs = Vec::new();
        for string in table.children {
            let string = string?;
            if string.value_type != TEXT_VALUE && !string.value.is_empty() {
                debug!("String {:?} has binary value type", string.key);
            }
            let value = string.text();
            pairs.push((string.key, value));
        }

        info.properties.extend(pairs);
        info.tables.push(id);
    }

    Ok(())
}

fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}

fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads a NUL-terminated UTF-16LE string; returns it and the offset past the NUL.
fn read_utf16z(data: &[u8], offset: usize) -> Option<(String, usize)> {
    let mut units = Vec::new();
    let mut cursor = offset;
    loop {
        let unit = read_u16(data, cursor)?;
        cursor += 2;
        if unit == 0 {
            return Some((String::from_utf16_lossy(&units), cursor));
        }
        units.push(unit);
    }
}
