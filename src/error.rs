use thiserror::Error;

use crate::fs::FsFile;

/// Errors that can occur while resolving a device layout, accessing the
/// appended script block, or encoding/decoding the chunked filesystem.
#[derive(Error, Debug)]
pub enum Error {
    /// A magic number or structured header did not match the expected format.
    #[error("invalid device format: {0}")]
    Format(String),

    /// A computed address or table position fell outside the usable range.
    #[error("address range error: {0}")]
    Bounds(String),

    /// The filesystem region or the appended script block ran out of room.
    #[error("not enough storage: {0}")]
    Capacity(String),

    /// On-flash chunk data contradicts itself (broken links, bad lengths).
    #[error("filesystem integrity error: {0}")]
    Integrity(String),

    /// A file name or content failed validation before any write took place.
    #[error("invalid file: {0}")]
    Validation(String),

    /// One or more files could not be decoded from the filesystem region.
    ///
    /// Reading completes as much work as possible: every file that decoded
    /// cleanly is carried in `files` alongside the accumulated `failures`.
    #[error("failed to read {} file(s) from the filesystem: {}", failures.len(), failures.join("; "))]
    FilesystemRead {
        /// Files that decoded successfully despite the failures.
        files: Vec<FsFile>,
        /// One message per file that could not be decoded.
        failures: Vec<String>,
    },
}
