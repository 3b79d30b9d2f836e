//! Flash-regions table resolver.
//!
//! Current-generation firmware replaces the UICR record with a
//! self-describing table placed at the very end of the runtime's last flash
//! page. The 16-byte table header ends in two magic words; a fixed-stride
//! row per region sits immediately before it, growing downwards. The table
//! is physically the last thing the runtime owns, so the header's own end
//! address doubles as the runtime end address.

use log::{
    debug,
    trace,
};

use super::{
    DeviceGeneration,
    DeviceLayout,
};
use crate::config::BoardConfig;
use crate::error::Error;
use crate::memory::{
    self,
    MemoryMap,
};

const TABLE_HEADER_LEN: u32 = 16;
const REGION_ROW_LEN: u32 = 16;

// Header field offsets from the header start (the header occupies the last
// 16 bytes of its page, the two magic words last).
const HEADER_PAGE_SIZE_LOG2_OFFSET: u32 = 0;
const HEADER_REGION_COUNT_OFFSET: u32 = 2;
const HEADER_TABLE_LENGTH_OFFSET: u32 = 4;
const HEADER_VERSION_OFFSET: u32 = 6;
const HEADER_MAGIC_1_OFFSET: u32 = 8;
const HEADER_MAGIC_2_OFFSET: u32 = 12;

// Region row field offsets.
const ROW_ID_OFFSET: u32 = 0;
const ROW_HASH_TYPE_OFFSET: u32 = 1;
const ROW_START_PAGE_OFFSET: u32 = 2;
const ROW_LENGTH_OFFSET: u32 = 4;
const ROW_HASH_DATA_OFFSET: u32 = 8;
const ROW_HASH_DATA_LEN: usize = 8;

/// Region holding the MicroPython runtime.
const REGION_ID_RUNTIME: u8 = 2;
/// Region holding the chunked filesystem.
const REGION_ID_FILESYSTEM: u8 = 3;

const HASH_TYPE_EMPTY: u8 = 0;
const HASH_TYPE_DATA: u8 = 1;
const HASH_TYPE_POINTER: u8 = 2;

struct TableHeader {
    page_size_log2: u16,
    region_count: u16,
    table_length: u16,
    version: u16,
    start_address: u32,
    end_address: u32,
}

struct RegionRow {
    id: u8,
    hash_type: u8,
    start_page: u16,
    length: u32,
    hash_data: [u8; ROW_HASH_DATA_LEN],
}

/// Decode the flash-regions table into a [`DeviceLayout`].
pub(crate) fn resolve(map: &MemoryMap, config: &BoardConfig) -> Result<DeviceLayout, Error> {
    let header = find_table_header(map, config)?;
    trace!(
        "flash regions table v{} at 0x{:08x}: {} region(s), {} bytes",
        header.version,
        header.start_address,
        header.region_count,
        header.table_length
    );

    if header.page_size_log2 >= 32 {
        return Err(Error::Format(format!(
            "flash regions table declares an impossible page size (2^{})",
            header.page_size_log2
        )));
    }
    let page_size = 1u32 << header.page_size_log2;

    // Rows sit immediately before the header and must not run off the top
    // of the header's page.
    let rows_len = header.region_count as u32 * REGION_ROW_LEN;
    let page_start = header.end_address - config.regions_scan_page_size;
    if rows_len > header.start_address - page_start {
        return Err(Error::Bounds(format!(
            "{} region rows overrun the page holding the table at 0x{:08x}",
            header.region_count, header.start_address
        )));
    }

    let mut runtime: Option<RegionRow> = None;
    let mut filesystem: Option<RegionRow> = None;
    for i in 0..header.region_count as u32 {
        let row = read_row(map, header.start_address - (i + 1) * REGION_ROW_LEN);
        match row.id {
            REGION_ID_RUNTIME => runtime = Some(row),
            REGION_ID_FILESYSTEM => filesystem = Some(row),
            id => trace!("ignoring region id {id} in flash regions table"),
        }
    }

    let runtime = runtime.ok_or_else(|| {
        Error::Bounds("flash regions table has no runtime region".to_string())
    })?;
    let filesystem = filesystem.ok_or_else(|| {
        Error::Bounds("flash regions table has no filesystem region".to_string())
    })?;

    let flash_start = config.flash_start_address;
    let flash_end = flash_start + config.current_flash_size;

    let region_start = |row: &RegionRow| {
        (row.start_page as u32)
            .checked_mul(page_size)
            .and_then(|offset| flash_start.checked_add(offset))
            .ok_or_else(|| {
                Error::Bounds(format!(
                    "region {} start page {} overflows the address space",
                    row.id, row.start_page
                ))
            })
    };

    let runtime_start = region_start(&runtime)?;
    // The table itself belongs to the runtime's last page, so the span used
    // by the runtime ends where the table ends.
    let runtime_end = header.end_address;

    let fs_start = region_start(&filesystem)?;
    let fs_end = fs_start.checked_add(filesystem.length).ok_or_else(|| {
        Error::Bounds(format!(
            "filesystem region length 0x{:x} overflows its 0x{fs_start:08x} start",
            filesystem.length
        ))
    })?;
    if fs_end > flash_end {
        return Err(Error::Bounds(format!(
            "filesystem region 0x{fs_start:08x}..0x{fs_end:08x} exceeds the 0x{flash_end:08x} \
             flash end"
        )));
    }

    let firmware_version = match runtime.hash_type {
        HASH_TYPE_POINTER => {
            let ptr = u32::from_le_bytes(runtime.hash_data[..4].try_into().unwrap());
            memory::read_cstring(map, ptr)
        }
        HASH_TYPE_DATA => hex::encode(runtime.hash_data),
        HASH_TYPE_EMPTY => String::new(),
        other => {
            return Err(Error::Format(format!(
                "unknown hash type {other} in the runtime region row"
            )));
        }
    };

    debug!(
        "flash regions layout: page size {page_size}, runtime \
         0x{runtime_start:08x}..0x{runtime_end:08x}, fs 0x{fs_start:08x}..0x{fs_end:08x}"
    );

    Ok(DeviceLayout {
        flash_page_size: page_size,
        flash_size: config.current_flash_size,
        flash_start_address: flash_start,
        flash_end_address: flash_end,
        runtime_start_address: runtime_start,
        runtime_end_address: runtime_end,
        fs_start_address: fs_start,
        fs_end_address: fs_end,
        firmware_version,
        generation: DeviceGeneration::Current,
    })
}

/// Scan every page boundary for the two magic words that terminate the
/// table header.
fn find_table_header(map: &MemoryMap, config: &BoardConfig) -> Result<TableHeader, Error> {
    let page = config.regions_scan_page_size;
    let flash_end = config.flash_start_address + config.current_flash_size;

    let mut page_end = config.flash_start_address + page;
    while page_end <= flash_end {
        let magic_1 = memory::read_u32_le(map, page_end - TABLE_HEADER_LEN + HEADER_MAGIC_1_OFFSET);
        let magic_2 = memory::read_u32_le(map, page_end - TABLE_HEADER_LEN + HEADER_MAGIC_2_OFFSET);
        if magic_1 == config.regions_magic_1 && magic_2 == config.regions_magic_2 {
            let start_address = page_end - TABLE_HEADER_LEN;
            return Ok(TableHeader {
                page_size_log2: memory::read_u16_le(
                    map,
                    start_address + HEADER_PAGE_SIZE_LOG2_OFFSET,
                ),
                region_count: memory::read_u16_le(map, start_address + HEADER_REGION_COUNT_OFFSET),
                table_length: memory::read_u16_le(map, start_address + HEADER_TABLE_LENGTH_OFFSET),
                version: memory::read_u16_le(map, start_address + HEADER_VERSION_OFFSET),
                start_address,
                end_address: page_end,
            });
        }
        page_end += page;
    }

    Err(Error::Bounds(format!(
        "no flash regions table found in the first 0x{:x} bytes of the image",
        config.current_flash_size
    )))
}

fn read_row(map: &MemoryMap, addr: u32) -> RegionRow {
    RegionRow {
        id: memory::read_u8(map, addr + ROW_ID_OFFSET),
        hash_type: memory::read_u8(map, addr + ROW_HASH_TYPE_OFFSET),
        start_page: memory::read_u16_le(map, addr + ROW_START_PAGE_OFFSET),
        length: memory::read_u32_le(map, addr + ROW_LENGTH_OFFSET),
        hash_data: map
            .slice_pad(addr + ROW_HASH_DATA_OFFSET, ROW_HASH_DATA_LEN, 0xFF)
            .try_into()
            .unwrap(),
    }
}
