//! Device memory layout resolution.
//!
//! Two on-flash metadata formats describe where the runtime ends and the
//! filesystem region begins: the legacy fixed-offset UICR record and the
//! newer self-describing flash-regions table. [`resolve`] normalizes both
//! into one [`DeviceLayout`] value so callers never branch on the format
//! beyond logging [`DeviceLayout::generation`].

pub(crate) mod regions;
pub(crate) mod uicr;

use serde::Serialize;

use crate::config::BoardConfig;
use crate::error::Error;
use crate::memory::MemoryMap;

/// Which on-flash metadata format described the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceGeneration {
    /// UICR record (nRF51-era devices, 256 KiB flash).
    Legacy,
    /// Flash-regions table (current devices, 512 KiB flash).
    Current,
}

impl std::fmt::Display for DeviceGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Current => f.write_str("current"),
        }
    }
}

/// Normalized description of one device's flash layout.
///
/// Produced fresh on every query; a pure value with no identity beyond its
/// fields. All addresses are multiples of `flash_page_size`, the filesystem
/// region starts exactly where the runtime ends, and `fs_end_address` never
/// exceeds `flash_end_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceLayout {
    /// Size of one flash page in bytes.
    pub flash_page_size: u32,
    /// Total flash size in bytes.
    pub flash_size: u32,
    /// First flash address.
    pub flash_start_address: u32,
    /// One past the last flash address.
    pub flash_end_address: u32,
    /// First address used by the runtime.
    pub runtime_start_address: u32,
    /// One past the last address used by the runtime.
    pub runtime_end_address: u32,
    /// First address of the filesystem region.
    pub fs_start_address: u32,
    /// One past the last address of the filesystem region.
    pub fs_end_address: u32,
    /// Version string baked into the runtime, empty if unavailable.
    pub firmware_version: String,
    /// Which metadata format produced this layout.
    pub generation: DeviceGeneration,
}

/// Resolve the device layout from an image.
///
/// Tries the UICR record first and falls back to the flash-regions table.
/// When both fail the returned [`Error::Format`] concatenates the two
/// underlying messages so callers can tell which format was expected.
pub(crate) fn resolve(map: &MemoryMap, config: &BoardConfig) -> Result<DeviceLayout, Error> {
    let uicr_err = match uicr::resolve(map, config) {
        Ok(layout) => return Ok(layout),
        Err(e) => e,
    };
    match regions::resolve(map, config) {
        Ok(layout) => Ok(layout),
        Err(regions_err) => Err(Error::Format(format!("{uicr_err}; {regions_err}"))),
    }
}
