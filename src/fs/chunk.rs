//! The 128-byte chunk record.
//!
//! Byte 0 is the marker, the last byte is the tail, and everything in
//! between is payload. Centralizing the offset arithmetic here keeps the
//! chain algorithms free of raw indexing.

/// Marker of a chunk that has never been written (erased flash).
pub(crate) const MARKER_UNUSED: u8 = 0xFF;
/// Marker of a chunk whose file has been deleted.
pub(crate) const MARKER_FREED: u8 = 0x00;
/// Marker of the first chunk of a file.
pub(crate) const MARKER_FILE_START: u8 = 0xFE;
/// Marker byte flagging the reserved persistent page as initialized.
pub(crate) const MARKER_PERSISTENT_PAGE: u8 = 0xFD;
/// Tail value of the last chunk in a chain.
pub(crate) const TAIL_UNUSED: u8 = 0xFF;
/// Highest 1-based chunk index a marker or tail byte can carry.
pub(crate) const MAX_CHUNK_INDEX: u8 = 0xFC;

/// One storage unit of the filesystem region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Chunk {
    bytes: Vec<u8>,
}

impl Chunk {
    /// Wrap a full chunk read out of the image.
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.len() >= 3);
        Self { bytes }
    }

    /// A fresh chunk of `size` bytes, everything erased.
    pub(crate) fn blank(size: usize) -> Self {
        Self {
            bytes: vec![MARKER_UNUSED; size],
        }
    }

    pub(crate) fn marker(&self) -> u8 {
        self.bytes[0]
    }

    pub(crate) fn set_marker(&mut self, marker: u8) {
        self.bytes[0] = marker;
    }

    pub(crate) fn tail(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    pub(crate) fn set_tail(&mut self, tail: u8) {
        let last = self.bytes.len() - 1;
        self.bytes[last] = tail;
    }

    /// The payload area between the marker and the tail.
    pub(crate) fn data(&self) -> &[u8] {
        &self.bytes[1..self.bytes.len() - 1]
    }

    /// Copy `data` into the payload area starting at its first byte.
    pub(crate) fn fill_data(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= self.bytes.len() - 2);
        self.bytes[1..1 + data.len()].copy_from_slice(data);
    }

    /// True if this slot can be allocated to a new chain.
    pub(crate) fn is_free(&self) -> bool {
        self.marker() == MARKER_UNUSED || self.marker() == MARKER_FREED
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
