//! micro:bit MicroPython flash filesystem parser and generator.
//!
//! Host-side codec for the chunked filesystem embedded in a micro:bit flash
//! image. The image is consumed as a sparse [`MemoryMap`] (address to byte);
//! parsing and emitting the textual transport formats for that map is the
//! caller's concern.
//!
//! [`FsCodec`] is the entry point: it resolves the device memory layout
//! (UICR record or flash-regions table), reads and writes the appended user
//! script block, and encodes/decodes files in the chunked filesystem region
//! without running the target firmware.

pub mod config;
pub mod error;
pub mod memory;

mod fs;
mod layout;
mod script;

use std::collections::BTreeMap;

pub use config::BoardConfig;
pub use error::Error;
pub use fs::FsFile;
pub use layout::{
    DeviceGeneration,
    DeviceLayout,
};
pub use memory::MemoryMap;

/// Codec over one board family's flash layout.
///
/// Every operation is a pure, synchronous transformation of the given
/// [`MemoryMap`]; no state is kept between calls, so independent maps can
/// be processed in parallel by the host application.
#[derive(Debug, Clone, Default)]
pub struct FsCodec {
    config: BoardConfig,
}

impl FsCodec {
    /// A codec with the default micro:bit board constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec with custom board constants.
    pub fn with_config(config: BoardConfig) -> Self {
        Self { config }
    }

    /// The board constants this codec operates with.
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Resolve the device memory layout from an image.
    ///
    /// Tries the legacy UICR record first and falls back to the
    /// flash-regions table; the error of a double miss names both formats.
    pub fn resolve_device_layout(&self, map: &MemoryMap) -> Result<DeviceLayout, Error> {
        layout::resolve(map, &self.config)
    }

    /// True iff an appended script block is present in the image.
    pub fn is_appended_script_present(&self, map: &MemoryMap) -> bool {
        script::is_present(map, &self.config)
    }

    /// Read the appended script, or an empty string when absent.
    pub fn read_appended_script(&self, map: &MemoryMap) -> String {
        script::read(map, &self.config)
    }

    /// Write `text` as the appended script block, replacing any previous
    /// one.
    pub fn write_appended_script(&self, map: &mut MemoryMap, text: &str) -> Result<(), Error> {
        script::write(map, &self.config, text)
    }

    /// Decode every file in the filesystem region, keyed by name.
    ///
    /// When some chains are corrupt or names collide, the returned
    /// [`Error::FilesystemRead`] still carries every cleanly decoded file.
    pub fn list_files(&self, map: &MemoryMap) -> Result<BTreeMap<String, Vec<u8>>, Error> {
        let files = fs::reader::read_files(map, &self.config)?;
        Ok(files.into_iter().map(|f| (f.name, f.bytes)).collect())
    }

    /// Write one file into the filesystem region.
    ///
    /// Always builds a fresh chunk chain; the full chain is staged in
    /// memory and only applied once allocation has succeeded, so a failed
    /// write leaves the image untouched.
    pub fn write_file(&self, map: &mut MemoryMap, name: &str, content: &[u8]) -> Result<(), Error> {
        fs::writer::write_file(map, &self.config, name, content)
    }

    /// Write several files, validating every name and content first.
    pub fn write_files(&self, map: &mut MemoryMap, files: &[FsFile]) -> Result<(), Error> {
        for file in files {
            fs::writer::validate(&self.config, &file.name, &file.bytes)?;
        }
        for file in files {
            fs::writer::write_file(map, &self.config, &file.name, &file.bytes)?;
        }
        Ok(())
    }

    /// Total capacity of the filesystem region in bytes (whole chunks).
    pub fn filesystem_capacity_bytes(&self, map: &MemoryMap) -> Result<u32, Error> {
        let layout = self.resolve_device_layout(map)?;
        let bounds = fs::fs_bounds(map, &layout, &self.config)?;
        Ok(bounds.chunk_count() as u32 * self.config.chunk_size)
    }

    /// Bytes still available for new files (free chunks, whole chunks).
    pub fn filesystem_free_bytes(&self, map: &MemoryMap) -> Result<u32, Error> {
        let layout = self.resolve_device_layout(map)?;
        let bounds = fs::fs_bounds(map, &layout, &self.config)?;
        let free = fs::writer::scan_free_chunks(map, &bounds);
        Ok(free.len() as u32 * self.config.chunk_size)
    }

    /// On-flash size of a file in bytes, counting whole chunks.
    ///
    /// A name-plus-content payload that is an exact multiple of the chunk
    /// data size occupies one extra chunk, matching the device firmware.
    pub fn file_size(&self, name: &str, content: &[u8]) -> u32 {
        fs::file_size(&self.config, name, content)
    }
}
