//! Builders for synthetic PE images used by the integration tests.

#![allow(dead_code)]

pub const MACHINE_I386: u16 = 0x014c;
pub const MACHINE_AMD64: u16 = 0x8664;
pub const MACHINE_ARM64: u16 = 0xaa64;

pub const IMPORT_TABLE: usize = 1;
pub const RESOURCE_TABLE: usize = 2;

const SECTION_ALIGNMENT: u32 = 0x1000;
const FILE_ALIGNMENT: u32 = 0x200;
const NT_HEADERS_OFFSET: usize = 0x40;
const DIRECTORY_FLAG: u32 = 0x8000_0000;

fn align(value: u32, to: u32) -> u32 {
    value.div_ceil(to) * to
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

struct SectionSpec {
    name: String,
    virtual_address: u32,
    data: Vec<u8>,
}

/// Minimal PE32/PE32+ image writer.
pub struct PeBuilder {
    machine: u16,
    is_64: bool,
    sections: Vec<SectionSpec>,
    directories: [(u32, u32); 16],
}

impl PeBuilder {
    pub fn new(machine: u16, is_64: bool) -> Self {
        Self {
            machine,
            is_64,
            sections: Vec::new(),
            directories: [(0, 0); 16],
        }
    }

    /// RVA the next added section will be mapped at.
    pub fn next_section_va(&self) -> u32 {
        match self.sections.last() {
            None => SECTION_ALIGNMENT,
            Some(last) => align(
                last.virtual_address + (last.data.len() as u32).max(1),
                SECTION_ALIGNMENT,
            ),
        }
    }

    pub fn section(&mut self, name: &str, data: Vec<u8>) -> &mut Self {
        assert!(name.len() <= 8 && !data.is_empty());
        let virtual_address = self.next_section_va();
        self.sections.push(SectionSpec {
            name: name.to_string(),
            virtual_address,
            data,
        });
        self
    }

    pub fn directory(&mut self, index: usize, virtual_address: u32, size: u32) -> &mut Self {
        self.directories[index] = (virtual_address, size);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let optional_size = if self.is_64 { 112 + 128 } else { 96 + 128 };
        let file_header = NT_HEADERS_OFFSET + 4;
        let optional = file_header + 20;
        let section_table = optional + optional_size;
        let headers_size = align(
            (section_table + self.sections.len() * 40) as u32,
            FILE_ALIGNMENT,
        );

        let mut raw_offsets = Vec::new();
        let mut file_size = headers_size;
        for section in &self.sections {
            raw_offsets.push(file_size);
            file_size += align(section.data.len() as u32, FILE_ALIGNMENT);
        }

        let mut out = vec![0u8; file_size as usize];

        out[0..2].copy_from_slice(b"MZ");
        put_u32(&mut out, 0x3c, NT_HEADERS_OFFSET as u32);
        out[NT_HEADERS_OFFSET..NT_HEADERS_OFFSET + 4].copy_from_slice(b"PE\0\0");

        put_u16(&mut out, file_header, self.machine);
        put_u16(&mut out, file_header + 2, self.sections.len() as u16);
        put_u16(&mut out, file_header + 16, optional_size as u16);
        put_u16(
            &mut out,
            file_header + 18,
            if self.is_64 { 0x0022 } else { 0x0102 },
        );

        put_u16(&mut out, optional, if self.is_64 { 0x20b } else { 0x10b });
        if self.is_64 {
            put_u64(&mut out, optional + 24, 0x1_4000_0000);
        } else {
            put_u32(&mut out, optional + 28, 0x40_0000);
        }
        put_u32(&mut out, optional + 32, SECTION_ALIGNMENT);
        put_u32(&mut out, optional + 36, FILE_ALIGNMENT);
        put_u16(&mut out, optional + 40, 6);
        put_u16(&mut out, optional + 48, 6);
        put_u32(&mut out, optional + 56, self.next_section_va());
        put_u32(&mut out, optional + 60, headers_size);
        put_u16(&mut out, optional + 68, 3);

        let (rva_count, directories) = if self.is_64 {
            (optional + 108, optional + 112)
        } else {
            (optional + 92, optional + 96)
        };
        put_u32(&mut out, rva_count, 16);
        for (i, &(virtual_address, size)) in self.directories.iter().enumerate() {
            put_u32(&mut out, directories + i * 8, virtual_address);
            put_u32(&mut out, directories + i * 8 + 4, size);
        }

        for (i, (section, &raw)) in self.sections.iter().zip(&raw_offsets).enumerate() {
            let header = section_table + i * 40;
            out[header..header + section.name.len()].copy_from_slice(section.name.as_bytes());
            put_u32(&mut out, header + 8, section.data.len() as u32);
            put_u32(&mut out, header + 12, section.virtual_address);
            put_u32(
                &mut out,
                header + 16,
                align(section.data.len() as u32, FILE_ALIGNMENT),
            );
            put_u32(&mut out, header + 20, raw);
            put_u32(&mut out, header + 36, 0x4000_0040);

            let start = raw as usize;
            out[start..start + section.data.len()].copy_from_slice(&section.data);
        }

        out
    }
}

/// Import descriptors followed by the DLL names. Returns the section bytes
/// and the size of the descriptor table.
pub fn import_section(base_va: u32, libraries: &[&str]) -> (Vec<u8>, u32) {
    let table_size = (libraries.len() + 1) * 20;
    let mut out = vec![0u8; table_size];

    for (i, library) in libraries.iter().enumerate() {
        let name_rva = base_va + out.len() as u32;
        out.extend_from_slice(library.as_bytes());
        out.push(0);
        put_u32(&mut out, i * 20 + 12, name_rva);
    }

    (out, table_size as u32)
}

/// A type/name/language resource tree with a single RT_VERSION leaf.
pub fn resource_tree(payload_rva: u32, payload_size: u32) -> Vec<u8> {
    let mut out = vec![0u8; 88];
    for (at, id, target) in [
        (0, 16, DIRECTORY_FLAG | 24),
        (24, 1, DIRECTORY_FLAG | 48),
        (48, 0x409, 72),
    ] {
        put_u16(&mut out, at + 14, 1);
        put_u32(&mut out, at + 16, id);
        put_u32(&mut out, at + 20, target);
    }
    put_u32(&mut out, 72, payload_rva);
    put_u32(&mut out, 76, payload_size);
    put_u32(&mut out, 80, 1200);
    out
}

/// A resource tree immediately followed by its version payload.
pub fn resource_section(base_va: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = resource_tree(base_va + 88, payload.len() as u32);
    out.extend_from_slice(payload);
    out
}

fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

fn utf16z(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(Some(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn record(key: &str, value_type: u16, value_length: u16, value: &[u8], children: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = vec![0; 6];
    buf.extend(utf16z(key));
    pad4(&mut buf);
    buf.extend_from_slice(value);
    for child in children {
        pad4(&mut buf);
        buf.extend_from_slice(child);
    }
    let length = buf.len() as u16;
    buf[0..2].copy_from_slice(&length.to_le_bytes());
    buf[2..4].copy_from_slice(&value_length.to_le_bytes());
    buf[4..6].copy_from_slice(&value_type.to_le_bytes());
    buf
}

/// A `VS_VERSIONINFO` resource with file version 1.2.3.4 and one
/// `040904b0` string table holding `properties`.
pub fn version_resource(properties: &[(&str, &str)]) -> Vec<u8> {
    let strings: Vec<_> = properties
        .iter()
        .map(|(key, value)| {
            let units = value.encode_utf16().count() as u16 + 1;
            record(key, 1, units, &utf16z(value), &[])
        })
        .collect();
    let table = record("040904b0", 1, 0, &[], &strings);
    let string_file_info = record("StringFileInfo", 1, 0, &[], &[table]);
    let translation = record("Translation", 0, 4, &[0x09, 0x04, 0xb0, 0x04], &[]);
    let var_file_info = record("VarFileInfo", 1, 0, &[], &[translation]);

    let fixed: Vec<u8> = [
        0xFEEF_04BDu32,
        0x0001_0000,
        0x0001_0002,
        0x0003_0004,
        0x0001_0002,
        0x0003_0004,
        0x3f,
        0,
        0x0004_0004,
        1,
        0,
        0,
        0,
    ]
    .iter()
    .flat_map(|field| field.to_le_bytes())
    .collect();

    record("VS_VERSION_INFO", 0, 52, &fixed, &[string_file_info, var_file_info])
}
