//! Layout-generic helpers over `object`'s PE file reader.

use super::{DataDirectory, Machine, Section, DATA_DIRECTORY_COUNT};
use object::pe::ImageSectionHeader;
use object::read::pe::{ImageNtHeaders, PeFile};
use object::{LittleEndian as LE, ReadRef};

pub(super) fn machine<'data, Pe, R>(file: &PeFile<'data, Pe, R>) -> Machine
where
    Pe: ImageNtHeaders,
    R: ReadRef<'data>,
{
    Machine::from_raw(file.nt_headers().file_header().machine.get(LE))
}

pub(super) fn data_directories<'data, Pe, R>(
    file: &PeFile<'data, Pe, R>,
) -> [DataDirectory; DATA_DIRECTORY_COUNT]
where
    Pe: ImageNtHeaders,
    R: ReadRef<'data>,
{
    // Images may declare fewer than 16 entries; missing ones read as empty.
    let mut directories = [DataDirectory::default(); DATA_DIRECTORY_COUNT];
    for (slot, dir) in directories.iter_mut().zip(file.data_directories().iter()) {
        *slot = DataDirectory {
            virtual_address: dir.virtual_address.get(LE),
            size: dir.size.get(LE),
        };
    }
    directories
}

pub(super) fn section_by_name<'data, Pe, R>(
    file: &PeFile<'data, Pe, R>,
    name: &str,
) -> object::Result<Option<Section<'data>>>
where
    Pe: ImageNtHeaders,
    R: ReadRef<'data>,
{
    file.section_table()
        .iter()
        .find(|header| header.raw_name() == name.as_bytes())
        .map(|header| section_info(file, header))
        .transpose()
}

pub(super) fn section_containing_rva<'data, Pe, R>(
    file: &PeFile<'data, Pe, R>,
    rva: u32,
) -> object::Result<Option<Section<'data>>>
where
    Pe: ImageNtHeaders,
    R: ReadRef<'data>,
{
    file.section_table()
        .section_containing(rva)
        .map(|header| section_info(file, header))
        .transpose()
}

pub(super) fn imported_library_names<'data, Pe, R>(
    file: &PeFile<'data, Pe, R>,
) -> object::Result<Vec<String>>
where
    Pe: ImageNtHeaders,
    R: ReadRef<'data>,
{
    let Some(table) = file.import_table()? else {
        return Ok(Vec::new());
    };

    // One entry per descriptor; a DLL imported by several descriptors is listed each time.
    let mut names = Vec::new();
    let mut descriptors = table.descriptors()?;
    while let Some(descriptor) = descriptors.next()? {
        let name = table.name(descriptor.name.get(LE))?;
        names.push(String::from_utf8_lossy(name).into_owned());
    }

    Ok(names)
}

fn section_info<'data, Pe, R>(
    file: &PeFile<'data, Pe, R>,
    header: &'data ImageSectionHeader,
) -> object::Result<Section<'data>>
where
    Pe: ImageNtHeaders,
    R: ReadRef<'data>,
{
    // A section that exists but cannot be read is an error, not an absence.
    let data = header.pe_data(file.data())?;

    Ok(Section {
        name: header.raw_name(),
        virtual_address: header.virtual_address.get(LE),
        data,
    })
}
