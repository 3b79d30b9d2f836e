//! Region scan and chunk-chain replay.
//!
//! One pass over the filesystem region classifies every chunk; each
//! file-start chunk then seeds one reconstruction. Per-file failures are
//! accumulated rather than raised on first detection, so a single corrupt
//! chain never hides the files that decoded cleanly.

use std::collections::BTreeMap;

use log::{
    debug,
    trace,
};

use crate::config::BoardConfig;
use crate::error::Error;
use crate::fs::chunk::{
    Chunk,
    MARKER_FILE_START,
    MARKER_PERSISTENT_PAGE,
    TAIL_UNUSED,
};
use crate::fs::{
    self,
    FsBounds,
    FsFile,
};
use crate::layout;
use crate::memory::{
    MemoryMap,
    PAD_BYTE,
};

/// Decode every file in the filesystem region.
///
/// On failure the returned [`Error::FilesystemRead`] still carries every
/// file that decoded cleanly.
pub(crate) fn read_files(map: &MemoryMap, config: &BoardConfig) -> Result<Vec<FsFile>, Error> {
    let layout = layout::resolve(map, config)?;
    let bounds = fs::fs_bounds(map, &layout, config)?;

    let in_use = scan_used_chunks(map, &bounds, config);
    trace!("{} chunk(s) in use", in_use.len());

    let mut files: Vec<FsFile> = Vec::new();
    let mut failures: Vec<String> = Vec::new();
    for (&index, chunk) in &in_use {
        if chunk.marker() != MARKER_FILE_START {
            continue;
        }
        match replay_chain(&in_use, index, config) {
            Ok(file) => {
                if files.iter().any(|f| f.name == file.name) {
                    failures.push(format!("duplicate file name '{}'", file.name));
                } else {
                    files.push(file);
                }
            }
            Err(e) => failures.push(e.to_string()),
        }
    }

    debug!("decoded {} file(s), {} failure(s)", files.len(), failures.len());
    if failures.is_empty() {
        Ok(files)
    } else {
        Err(Error::FilesystemRead { files, failures })
    }
}

/// Collect every in-use chunk, indexed by its 1-based position.
///
/// Unused, freed, and persistent-page chunks are ignored.
fn scan_used_chunks(
    map: &MemoryMap,
    bounds: &FsBounds,
    config: &BoardConfig,
) -> BTreeMap<u8, Chunk> {
    let mut in_use = BTreeMap::new();
    for index in 1..=bounds.chunk_count() {
        let bytes = map.slice_pad(
            bounds.chunk_address(index),
            config.chunk_size as usize,
            PAD_BYTE,
        );
        let chunk = Chunk::from_bytes(bytes);
        if chunk.is_free() || chunk.marker() == MARKER_PERSISTENT_PAGE {
            continue;
        }
        in_use.insert(index, chunk);
    }
    in_use
}

/// Replay one chunk chain starting at the file-start chunk `start`.
fn replay_chain(
    chunks: &BTreeMap<u8, Chunk>,
    start: u8,
    config: &BoardConfig,
) -> Result<FsFile, Error> {
    let first = &chunks[&start];
    let header = first.data();
    let end_offset = header[0] as usize;
    let name_len = header[1] as usize;
    if name_len == 0 || name_len > config.max_filename_length || 2 + name_len > header.len() {
        return Err(Error::Integrity(format!(
            "chunk {start} declares an invalid file name length ({name_len})"
        )));
    }
    let name = String::from_utf8(header[2..2 + name_len].to_vec()).map_err(|e| {
        Error::Integrity(format!("invalid UTF-8 in the file name at chunk {start}: {e}"))
    })?;

    let mut bytes = Vec::new();
    let mut index = start;
    let mut current = first;
    let mut consumed = 2 + name_len;
    let mut steps = 0usize;
    loop {
        steps += 1;
        if steps > chunks.len() {
            return Err(Error::Integrity(format!(
                "chunk chain for '{name}' is longer than the {} chunk(s) in use (malformed \
                 chain?)",
                chunks.len()
            )));
        }

        let data = current.data();
        let tail = current.tail();
        if tail == TAIL_UNUSED {
            // Terminal chunk: end_offset says how many payload bytes belong
            // to the file. Zero means the whole file already fit the
            // preceding chunks exactly.
            if end_offset < consumed || end_offset > data.len() {
                return Err(Error::Integrity(format!(
                    "file '{name}' declares end offset {end_offset} outside its final chunk"
                )));
            }
            bytes.extend_from_slice(&data[consumed..end_offset]);
            break;
        }

        bytes.extend_from_slice(&data[consumed..]);
        let next = chunks.get(&tail).ok_or_else(|| {
            Error::Integrity(format!(
                "chunk {index} of '{name}' points at chunk {tail}, which is not in use"
            ))
        })?;
        if next.marker() != index {
            return Err(Error::Integrity(format!(
                "broken chunk link in '{name}': chunk {tail} does not link back to chunk {index}"
            )));
        }
        index = tail;
        current = next;
        consumed = 0;
    }

    Ok(FsFile { name, bytes })
}
