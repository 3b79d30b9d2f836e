//! Legacy UICR device record resolver.
//!
//! nRF51-era firmware stores a small fixed-offset record in the UICR
//! customer registers: a magic value, the flash page size as a power of
//! two, the runtime's start page and page count, and a pointer to the
//! runtime's version string elsewhere in the image.

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

// Field offsets within the UICR MicroPython area.
const MAGIC_OFFSET: u32 = 0x00;
const END_MARKER_OFFSET: u32 = 0x04;
const PAGE_SIZE_LOG2_OFFSET: u32 = 0x08;
const START_PAGE_OFFSET: u32 = 0x0C;
const PAGES_USED_OFFSET: u32 = 0x0E;
const VERSION_LOCATION_OFFSET: u32 = 0x14;

/// Decode the UICR record into a [`DeviceLayout`].
///
/// A missing or mismatched magic value is the documented way callers learn
/// the image uses the flash-regions format instead.
pub(crate) fn resolve(map: &MemoryMap, config: &BoardConfig) -> Result<DeviceLayout, Error> {
    let base = config.uicr_upy_address;

    let magic = memory::read_u32_le(map, base + MAGIC_OFFSET);
    if magic != config.uicr_magic {
        return Err(Error::Format(format!(
            "UICR MicroPython magic value not found at 0x{:08x} (read 0x{:08x}, expected 0x{:08x})",
            base, magic, config.uicr_magic
        )));
    }
    trace!(
        "UICR end marker: 0x{:08x}",
        memory::read_u32_le(map, base + END_MARKER_OFFSET)
    );

    let page_size_log2 = memory::read_u32_le(map, base + PAGE_SIZE_LOG2_OFFSET);
    if page_size_log2 >= 32 {
        return Err(Error::Format(format!(
            "UICR record declares an impossible page size (2^{page_size_log2})"
        )));
    }
    let page_size = 1u32 << page_size_log2;

    let start_page = memory::read_u16_le(map, base + START_PAGE_OFFSET) as u32;
    let pages_used = memory::read_u16_le(map, base + PAGES_USED_OFFSET) as u32;

    let flash_start = config.flash_start_address;
    let flash_end = flash_start + config.legacy_flash_size;

    let overflow = || {
        Error::Bounds(format!(
            "UICR runtime span (page {start_page}, {pages_used} pages of {page_size} bytes) \
             overflows the address space"
        ))
    };
    let runtime_start = start_page
        .checked_mul(page_size)
        .and_then(|offset| flash_start.checked_add(offset))
        .ok_or_else(overflow)?;
    let runtime_end = pages_used
        .checked_mul(page_size)
        .and_then(|len| runtime_start.checked_add(len))
        .ok_or_else(overflow)?;
    if runtime_end > flash_end {
        return Err(Error::Bounds(format!(
            "UICR runtime span 0x{runtime_start:08x}..0x{runtime_end:08x} exceeds the \
             0x{flash_end:08x} flash end"
        )));
    }

    let version_address = memory::read_u32_le(map, base + VERSION_LOCATION_OFFSET);
    let firmware_version = memory::read_cstring(map, version_address);

    debug!(
        "UICR layout: page size {page_size}, runtime 0x{runtime_start:08x}..0x{runtime_end:08x}"
    );

    Ok(DeviceLayout {
        flash_page_size: page_size,
        flash_size: config.legacy_flash_size,
        flash_start_address: flash_start,
        flash_end_address: flash_end,
        runtime_start_address: runtime_start,
        runtime_end_address: runtime_end,
        fs_start_address: runtime_end,
        fs_end_address: flash_end,
        firmware_version,
        generation: DeviceGeneration::Legacy,
    })
}
