//! Chunk-chain construction and commit.
//!
//! Writing is a pure scan-then-allocate pass over the map: free chunks are
//! recomputed from the image on every call, the full chain is staged in
//! memory, and only a fully validated chain is applied to the map. A failed
//! write never leaves a half-written chain behind.

use log::debug;

use crate::config::BoardConfig;
use crate::error::Error;
use crate::fs::chunk::{
    Chunk,
    MARKER_FILE_START,
    MARKER_FREED,
    MARKER_PERSISTENT_PAGE,
    MARKER_UNUSED,
};
use crate::fs::{
    self,
    FsBounds,
};
use crate::layout;
use crate::memory::{
    self,
    MemoryMap,
};

/// Write one file into the filesystem region of `map`.
pub(crate) fn write_file(
    map: &mut MemoryMap,
    config: &BoardConfig,
    name: &str,
    content: &[u8],
) -> Result<(), Error> {
    validate(config, name, content)?;

    let layout = layout::resolve(map, config)?;
    let bounds = fs::fs_bounds(map, &layout, config)?;

    let free = scan_free_chunks(map, &bounds);
    if free.is_empty() {
        return Err(Error::Capacity(
            "no storage space left on the filesystem region".to_string(),
        ));
    }

    let chain = build_chain(config, name, content, &free)?;
    debug!("writing '{}' as {} chunk(s)", name, chain.len());
    for (index, chunk) in &chain {
        map.set(bounds.chunk_address(*index), chunk.as_bytes());
    }

    // The firmware checks this byte to decide the region is initialized.
    map.set(
        bounds.persistent_page_address(),
        &[MARKER_PERSISTENT_PAGE],
    );
    Ok(())
}

/// Reject names and contents the chunk header cannot represent.
pub(crate) fn validate(config: &BoardConfig, name: &str, content: &[u8]) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::Validation("file name must not be empty".to_string()));
    }
    if name.len() > config.max_filename_length {
        return Err(Error::Validation(format!(
            "file name '{name}' is too long ({} bytes, max {})",
            name.len(),
            config.max_filename_length
        )));
    }
    if content.is_empty() {
        return Err(Error::Validation(format!("file '{name}' has no content")));
    }
    Ok(())
}

/// Ascending list of free chunk indices in the region.
pub(crate) fn scan_free_chunks(map: &MemoryMap, bounds: &FsBounds) -> Vec<u8> {
    let mut free = Vec::new();
    for index in 1..=bounds.chunk_count() {
        let marker = memory::read_u8(map, bounds.chunk_address(index));
        if matches!(marker, MARKER_UNUSED | MARKER_FREED) {
            free.push(index);
        }
    }
    free
}

/// Stage the complete chunk chain for one file.
///
/// The payload is `[end_offset, name_len]` + name + content; `end_offset`
/// is the payload length modulo the chunk data size, stored up front in the
/// first chunk. A payload that exactly fills its chunks gets one extra
/// empty terminal chunk, matching the firmware's own writer.
fn build_chain(
    config: &BoardConfig,
    name: &str,
    content: &[u8],
    free: &[u8],
) -> Result<Vec<(u8, Chunk)>, Error> {
    let data_len = config.chunk_data_length as usize;

    let mut payload = Vec::with_capacity(2 + name.len() + content.len());
    let end_offset = ((2 + name.len() + content.len()) % data_len) as u8;
    payload.push(end_offset);
    payload.push(name.len() as u8);
    payload.extend_from_slice(name.as_bytes());
    payload.extend_from_slice(content);

    let needed = fs::chunk_count_for(data_len, payload.len());
    if needed > free.len() {
        return Err(Error::Capacity(format!(
            "not enough space to write file '{name}': {needed} chunk(s) needed, {} free",
            free.len()
        )));
    }

    let mut chain = Vec::with_capacity(needed);
    for i in 0..needed {
        // The trailing quirk chunk carries no bytes at all.
        let piece_start = (i * data_len).min(payload.len());
        let piece_end = ((i + 1) * data_len).min(payload.len());
        let piece = &payload[piece_start..piece_end];

        let mut chunk = Chunk::blank(config.chunk_size as usize);
        chunk.set_marker(if i == 0 { MARKER_FILE_START } else { free[i - 1] });
        if i + 1 < needed {
            chunk.set_tail(free[i + 1]);
        }
        chunk.fill_data(piece);
        chain.push((free[i], chunk));
    }
    Ok(chain)
}
