//! The chunked filesystem codec.
//!
//! Files live in fixed-size chunks inside the filesystem region between the
//! end of the runtime and the reserved last page. Each file is a singly
//! linked chunk chain confirmed in both directions: a chunk's tail names
//! the next chunk, and the next chunk's marker names the one before it.

pub(crate) mod chunk;
pub(crate) mod reader;
pub(crate) mod writer;

use serde::Serialize;

use crate::config::BoardConfig;
use crate::error::Error;
use crate::layout::DeviceLayout;
use crate::memory::MemoryMap;
use crate::script;

/// One decoded file: its name and raw content bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsFile {
    /// File name, at most 120 bytes on the default board.
    pub name: String,
    /// Raw content bytes.
    pub bytes: Vec<u8>,
}

/// Resolved bounds of the allocatable chunk area within one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FsBounds {
    /// Address of chunk index 1.
    pub start: u32,
    /// Exclusive end of allocatable slots; also the start of the reserved
    /// page holding the persistent-page marker.
    pub chunk_area_end: u32,
    /// Size of one chunk in bytes.
    pub chunk_size: u32,
}

impl FsBounds {
    /// Flash address of the 1-based chunk `index`.
    pub(crate) fn chunk_address(&self, index: u8) -> u32 {
        self.start + (index as u32 - 1) * self.chunk_size
    }

    /// Number of addressable chunk slots. Chains link chunks through single
    /// marker and tail bytes, so slots beyond [`chunk::MAX_CHUNK_INDEX`]
    /// can never be referenced and are not counted.
    pub(crate) fn chunk_count(&self) -> u8 {
        let slots = (self.chunk_area_end - self.start) / self.chunk_size;
        slots.min(chunk::MAX_CHUNK_INDEX as u32) as u8
    }

    /// Address of the persistent-page marker byte.
    pub(crate) fn persistent_page_address(&self) -> u32 {
        self.chunk_area_end
    }
}

/// Compute the chunk area for `layout`, shrinking the upper bound below an
/// appended script block when one is present and reserving the final page.
pub(crate) fn fs_bounds(
    map: &MemoryMap,
    layout: &DeviceLayout,
    config: &BoardConfig,
) -> Result<FsBounds, Error> {
    let start = layout.fs_start_address;
    if !start.is_multiple_of(layout.flash_page_size) {
        return Err(Error::Bounds(format!(
            "filesystem start address 0x{start:08x} is not aligned to the {} byte page size",
            layout.flash_page_size
        )));
    }

    let mut end = layout.fs_end_address.min(layout.flash_end_address);
    if script::is_present(map, config) && config.appended_script_address > start {
        end = end.min(config.appended_script_address);
    }

    let reserved = config.reserved_end_pages * layout.flash_page_size;
    let chunk_area_end = end
        .checked_sub(reserved)
        .filter(|area_end| *area_end > start)
        .ok_or_else(|| {
            Error::Bounds(format!(
                "filesystem region 0x{start:08x}..0x{end:08x} is smaller than its {reserved} \
                 reserved byte(s)"
            ))
        })?;

    Ok(FsBounds {
        start,
        chunk_area_end,
        chunk_size: config.chunk_size,
    })
}

/// Number of chunks a payload of `payload_len` bytes occupies.
///
/// When the payload exactly fills its chunks the device firmware still
/// allocates one extra, otherwise-empty chunk; generated images must match
/// that byte for byte, so the same rounding is applied here.
pub(crate) fn chunk_count_for(data_len: usize, payload_len: usize) -> usize {
    if payload_len.is_multiple_of(data_len) {
        payload_len / data_len + 1
    } else {
        payload_len.div_ceil(data_len)
    }
}

/// On-flash size of a file in bytes, counting whole chunks.
pub(crate) fn file_size(config: &BoardConfig, name: &str, content: &[u8]) -> u32 {
    let payload_len = 2 + name.len() + content.len();
    chunk_count_for(config.chunk_data_length as usize, payload_len) as u32 * config.chunk_size
}
