//! Appended user script block.
//!
//! A single fixed-address block, independent of the chunked filesystem,
//! holding an optional user script. The block starts with a two-byte
//! signature and a little-endian length, and the whole block is padded to a
//! 16-byte boundary so the textual transport formats emit whole records.

use log::debug;

use crate::config::BoardConfig;
use crate::error::Error;
use crate::memory::{
    self,
    MemoryMap,
    PAD_BYTE,
};

/// Signature identifying an appended MicroPython script block.
const SIGNATURE: [u8; 2] = *b"MP";
/// Signature plus a little-endian u16 script length.
const HEADER_LEN: usize = 4;
/// Line of colons very old firmware images used to mark where an appended
/// script begins; cleared when a new script is written over it.
const LEGACY_INSERTION_MARKER: &[u8] = b":::::::::::::::::::::::::::::::::::::::::::";

/// True iff the block starts with the script signature.
pub(crate) fn is_present(map: &MemoryMap, config: &BoardConfig) -> bool {
    map.slice_pad(config.appended_script_address, SIGNATURE.len(), PAD_BYTE) == SIGNATURE
}

/// Read the appended script as text.
///
/// Returns an empty string when the block is absent or its signature does
/// not match. Trailing NUL padding is trimmed.
pub(crate) fn read(map: &MemoryMap, config: &BoardConfig) -> String {
    if !is_present(map, config) {
        return String::new();
    }

    let addr = config.appended_script_address;
    let declared = memory::read_u16_le(map, addr + SIGNATURE.len() as u32) as usize;
    let available = config.appended_script_length as usize - HEADER_LEN;
    let len = declared.min(available);

    let bytes = map.slice_pad(addr + HEADER_LEN as u32, len, PAD_BYTE);
    String::from_utf8_lossy(&bytes)
        .trim_end_matches('\0')
        .to_string()
}

/// Write `text` as the appended script, replacing any previous block.
///
/// The block is header plus payload, NUL-padded to the configured record
/// alignment. Fails with [`Error::Capacity`] when the padded block exceeds
/// the fixed block length.
pub(crate) fn write(map: &mut MemoryMap, config: &BoardConfig, text: &str) -> Result<(), Error> {
    let script = text.as_bytes();
    let alignment = config.appended_script_alignment as usize;
    let padded = (HEADER_LEN + script.len()).div_ceil(alignment) * alignment;
    if padded > config.appended_script_length as usize {
        return Err(Error::Capacity(format!(
            "appended script is too large: {} bytes of script need a {padded} byte block, only \
             {} available",
            script.len(),
            config.appended_script_length
        )));
    }

    let addr = config.appended_script_address;
    let block_start = map.slice_pad(addr, LEGACY_INSERTION_MARKER.len(), PAD_BYTE);
    if block_start == LEGACY_INSERTION_MARKER {
        debug!("removing legacy script insertion marker at 0x{addr:08x}");
    }
    map.clear_range(addr, config.appended_script_length);

    let mut block = vec![0u8; padded];
    block[..SIGNATURE.len()].copy_from_slice(&SIGNATURE);
    block[SIGNATURE.len()..HEADER_LEN].copy_from_slice(&(script.len() as u16).to_le_bytes());
    block[HEADER_LEN..HEADER_LEN + script.len()].copy_from_slice(script);
    map.set(addr, &block);

    debug!("wrote {} script byte(s) as a {padded} byte block", script.len());
    Ok(())
}
