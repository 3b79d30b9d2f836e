//! Shared fixtures: hand-built flash images carrying a valid UICR record or
//! flash-regions table, the way real firmware lays them out.

#![allow(dead_code)]

use microbit_fs::MemoryMap;

/// UICR MicroPython area (UICR base + customer offset + MicroPython offset).
pub const UICR_UPY: u32 = 0x1000_10C0;
pub const UICR_MAGIC: u32 = 0x17EE_B07C;

pub const V1_VERSION_ADDR: u32 = 0x36000;
pub const V1_VERSION: &str = "micro:bit v1.0.1+b0bf4a4 MicroPython";
pub const V2_VERSION_ADDR: u32 = 0x50000;
pub const V2_VERSION: &str = "micro:bit v2.0.0+b25a8f9 MicroPython";

/// Filesystem bounds of the [`v1_image`] fixture.
pub const V1_FS_START: u32 = 0x38C00;
pub const V1_PERSISTENT_PAGE: u32 = 0x3FC00;

/// Filesystem bounds of the [`v2_image`] fixture.
pub const V2_FS_START: u32 = 0x6D000;
pub const V2_FS_END: u32 = 0x73000;

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Legacy-generation image: 1024-byte pages, runtime occupying pages
/// 0..227, so the filesystem region spans `0x38C00..0x40000`.
pub fn v1_image() -> MemoryMap {
    let mut map = MemoryMap::new();

    let mut record = Vec::new();
    record.extend(UICR_MAGIC.to_le_bytes()); // magic
    record.extend(UICR_MAGIC.to_le_bytes()); // end marker
    record.extend(10u32.to_le_bytes()); // page size = 2^10
    record.extend(0u16.to_le_bytes()); // runtime start page
    record.extend(227u16.to_le_bytes()); // pages used
    record.extend(0xFFFF_FFFFu32.to_le_bytes()); // delimiter
    record.extend(V1_VERSION_ADDR.to_le_bytes()); // version string pointer
    map.set(UICR_UPY, &record);

    let mut version = V1_VERSION.as_bytes().to_vec();
    version.push(0);
    map.set(V1_VERSION_ADDR, &version);

    map
}

/// Current-generation image: 4096-byte pages, a two-row flash-regions
/// table ending at `0x6D000`, filesystem region `0x6D000..0x73000`.
pub fn v2_image() -> MemoryMap {
    let mut map = MemoryMap::new();
    let table_end = V2_FS_START;
    let header_start = table_end - 16;

    let mut header = Vec::new();
    header.extend(12u16.to_le_bytes()); // page size = 2^12
    header.extend(2u16.to_le_bytes()); // region count
    header.extend(48u16.to_le_bytes()); // table length
    header.extend(1u16.to_le_bytes()); // format version
    header.extend(0x597F_30FEu32.to_le_bytes());
    header.extend(0xC1B1_D79Du32.to_le_bytes());
    map.set(header_start, &header);

    // Runtime row, hash type "pointer" to the version string.
    let mut runtime = Vec::new();
    runtime.push(2); // region id: runtime
    runtime.push(2); // hash type: pointer
    runtime.extend(0u16.to_le_bytes()); // start page
    runtime.extend(V2_FS_START.to_le_bytes()); // length
    runtime.extend(V2_VERSION_ADDR.to_le_bytes());
    runtime.extend([0xFF; 4]);
    map.set(header_start - 16, &runtime);

    // Filesystem row, no hash.
    let mut fs_row = Vec::new();
    fs_row.push(3); // region id: filesystem
    fs_row.push(0); // hash type: empty
    fs_row.extend(((V2_FS_START / 4096) as u16).to_le_bytes());
    fs_row.extend((V2_FS_END - V2_FS_START).to_le_bytes());
    fs_row.extend([0xFF; 8]);
    map.set(header_start - 32, &fs_row);

    let mut version = V2_VERSION.as_bytes().to_vec();
    version.push(0);
    map.set(V2_VERSION_ADDR, &version);

    map
}
