//! Board-specific layout constants.
//!
//! Every address, size, and magic number that varies between targets lives
//! here so the codec itself never hard-codes a board. [`BoardConfig::default`]
//! describes the BBC micro:bit family (nRF51 for the legacy generation,
//! nRF52833 for the current one).

/// Flash layout constants for one target board family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// First address of on-chip flash.
    pub flash_start_address: u32,
    /// Total flash on legacy-generation (UICR record) devices.
    pub legacy_flash_size: u32,
    /// Total flash on current-generation (flash-regions table) devices.
    pub current_flash_size: u32,

    /// Size of one filesystem storage unit in bytes.
    pub chunk_size: u32,
    /// Data bytes per chunk (chunk size minus the marker and tail bytes).
    pub chunk_data_length: u32,
    /// Longest file name the first chunk's header can carry.
    pub max_filename_length: usize,
    /// Full pages reserved at the end of the filesystem region. The first
    /// byte of the reserved page holds the persistent-page marker.
    pub reserved_end_pages: u32,

    /// Fixed flash address of the appended user script block.
    pub appended_script_address: u32,
    /// Total size of the appended script block in bytes.
    pub appended_script_length: u32,
    /// The script block is padded to a multiple of this many bytes.
    pub appended_script_alignment: u32,

    /// Address of the MicroPython area inside the UICR customer registers.
    pub uicr_upy_address: u32,
    /// Magic value identifying a MicroPython UICR record.
    pub uicr_magic: u32,

    /// First magic value of the flash-regions table header.
    pub regions_magic_1: u32,
    /// Second magic value of the flash-regions table header.
    pub regions_magic_2: u32,
    /// Page stride used when scanning for the flash-regions table.
    pub regions_scan_page_size: u32,
}

impl BoardConfig {
    /// The BBC micro:bit values used by [`Default`].
    pub const MICROBIT: BoardConfig = BoardConfig {
        flash_start_address: 0x0000_0000,
        legacy_flash_size: 256 * 1024,
        current_flash_size: 512 * 1024,

        chunk_size: 128,
        chunk_data_length: 126,
        max_filename_length: 120,
        reserved_end_pages: 1,

        appended_script_address: 0x3E000,
        appended_script_length: 8192,
        appended_script_alignment: 16,

        // UICR base + customer offset + MicroPython offset.
        uicr_upy_address: 0x1000_1000 + 0x80 + 0x40,
        uicr_magic: 0x17EE_B07C,

        regions_magic_1: 0x597F_30FE,
        regions_magic_2: 0xC1B1_D79D,
        regions_scan_page_size: 4096,
    };
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::MICROBIT
    }
}
