//! Sparse byte-addressable memory map and little-endian scalar readers.
//!
//! A flash image is a partial function from 32-bit address to byte. Erased
//! NOR flash reads as `0xFF`, so every reader in this module substitutes
//! [`PAD_BYTE`] for addresses the map does not contain — the padding rule is
//! an explicit property of this adapter, not a convention callers must
//! remember.

use std::collections::BTreeMap;

use log::debug;

/// Value returned for addresses outside the map's domain (erased flash).
pub const PAD_BYTE: u8 = 0xFF;

/// A sparse address-to-byte store over an unbounded 32-bit address space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMap {
    bytes: BTreeMap<u32, u8>,
}

impl MemoryMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `addr` has been written.
    pub fn has(&self, addr: u32) -> bool {
        self.bytes.contains_key(&addr)
    }

    /// The byte at `addr`, if present.
    pub fn get(&self, addr: u32) -> Option<u8> {
        self.bytes.get(&addr).copied()
    }

    /// Write a contiguous run of bytes starting at `addr`. Bytes past the
    /// top of the address space are dropped.
    pub fn set(&mut self, addr: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            match addr.checked_add(i as u32) {
                Some(a) => self.bytes.insert(a, *byte),
                None => break,
            };
        }
    }

    /// Remove `len` bytes starting at `addr` from the map's domain.
    pub fn clear_range(&mut self, addr: u32, len: u32) {
        let end = addr.saturating_add(len);
        for a in addr..end {
            self.bytes.remove(&a);
        }
    }

    /// Return `len` bytes starting at `addr`, substituting `pad` for absent
    /// positions.
    pub fn slice_pad(&self, addr: u32, len: usize, pad: u8) -> Vec<u8> {
        (0..len)
            .map(|i| {
                addr.checked_add(i as u32)
                    .and_then(|a| self.get(a))
                    .unwrap_or(pad)
            })
            .collect()
    }

    /// Return a restricted copy containing only `addr..addr + len`.
    pub fn slice(&self, addr: u32, len: u32) -> MemoryMap {
        let end = addr.saturating_add(len);
        MemoryMap {
            bytes: self
                .bytes
                .range(addr..end)
                .map(|(a, b)| (*a, *b))
                .collect(),
        }
    }

    /// Iterate over contiguous `(start_address, bytes)` runs in ascending
    /// address order.
    pub fn runs(&self) -> Vec<(u32, Vec<u8>)> {
        let mut runs: Vec<(u32, Vec<u8>)> = Vec::new();
        for (&addr, &byte) in &self.bytes {
            match runs.last_mut() {
                Some((start, bytes)) if *start + bytes.len() as u32 == addr => {
                    bytes.push(byte);
                }
                _ => runs.push((addr, vec![byte])),
            }
        }
        runs
    }
}

/// The byte at `addr`, padded with `0xFF` when absent.
pub fn read_u8(map: &MemoryMap, addr: u32) -> u8 {
    map.get(addr).unwrap_or(PAD_BYTE)
}

/// Little-endian u16 at `addr`, absent bytes padded with `0xFF`.
pub fn read_u16_le(map: &MemoryMap, addr: u32) -> u16 {
    u16::from_le_bytes(map.slice_pad(addr, 2, PAD_BYTE).try_into().unwrap())
}

/// Little-endian u32 at `addr`, absent bytes padded with `0xFF`.
pub fn read_u32_le(map: &MemoryMap, addr: u32) -> u32 {
    u32::from_le_bytes(map.slice_pad(addr, 4, PAD_BYTE).try_into().unwrap())
}

/// Little-endian u64 at `addr`, absent bytes padded with `0xFF`.
pub fn read_u64_le(map: &MemoryMap, addr: u32) -> u64 {
    u64::from_le_bytes(map.slice_pad(addr, 8, PAD_BYTE).try_into().unwrap())
}

/// Read a null-terminated string starting at `addr`.
///
/// Reads forward through the contiguous run of present bytes. If the run
/// ends before a NUL terminator is found the string is treated as empty,
/// matching what device firmware does with an unterminated version field.
pub fn read_cstring(map: &MemoryMap, addr: u32) -> String {
    let mut bytes = Vec::new();
    let mut a = addr;
    while map.has(a) {
        let byte = map.get(a).unwrap_or(0);
        if byte == 0 {
            return String::from_utf8_lossy(&bytes).into_owned();
        }
        bytes.push(byte);
        a = match a.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }
    if !bytes.is_empty() {
        debug!("no NUL terminator in the run at 0x{addr:08x}; treating string as empty");
    }
    String::new()
}
