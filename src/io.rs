// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

// ============================================================================
// TransferIo Trait
// ============================================================================

/// Storage and transport the receive pipeline writes through.
///
/// Both calls happen on the main loop and must return promptly.
pub trait TransferIo {
    /// Writes `bytes` at `offset` and returns how many were stored.
    /// A short count means the storage is full.
    fn write_storage(&mut self, bytes: &[u8], offset: u32) -> usize;

    /// Sends `bytes` to the host and returns how many went out.
    fn send_transport(&mut self, bytes: &[u8]) -> usize;

    /// Called on END with the session's extent. Returning `false` makes
    /// the END ACK carry `ResultCode::Unknown`.
    fn finalize(&mut self, _base_offset: u32, _bytes_stored: u32) -> bool {
        true
    }
}

impl<T: TransferIo + ?Sized> TransferIo for &mut T {
    fn write_storage(&mut self, bytes: &[u8], offset: u32) -> usize {
        (**self).write_storage(bytes, offset)
    }

    fn send_transport(&mut self, bytes: &[u8]) -> usize {
        (**self).send_transport(bytes)
    }

    fn finalize(&mut self, base_offset: u32, bytes_stored: u32) -> bool {
        (**self).finalize(base_offset, bytes_stored)
    }
}

// ============================================================================
// In-Memory Implementation for Testing
// ============================================================================

/// Records storage writes and sent frames in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryIo {
    pub storage: Vec<u8>,
    /// Writes are cut short once they would reach this size
    pub capacity: Option<usize>,
    /// `(offset, length)` of every storage call, including short ones
    pub writes: Vec<(u32, usize)>,
    pub sent: Vec<Vec<u8>>,
    pub finalized: Option<(u32, u32)>,
    pub fail_finalize: bool,
}

#[cfg(test)]
impl MemoryIo {
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryIo {
            capacity: Some(capacity),
            ..Default::default()
        }
    }
}

#[cfg(test)]
impl TransferIo for MemoryIo {
    fn write_storage(&mut self, bytes: &[u8], offset: u32) -> usize {
        self.writes.push((offset, bytes.len()));

        let start = offset as usize;
        let limit = self.capacity.unwrap_or(usize::MAX);
        let count = bytes.len().min(limit.saturating_sub(start));

        if self.storage.len() < start + count {
            self.storage.resize(start + count, 0);
        }
        self.storage[start..start + count].copy_from_slice(&bytes[..count]);
        count
    }

    fn send_transport(&mut self, bytes: &[u8]) -> usize {
        self.sent.push(bytes.to_vec());
        bytes.len()
    }

    fn finalize(&mut self, base_offset: u32, bytes_stored: u32) -> bool {
        self.finalized = Some((base_offset, bytes_stored));
        !self.fail_finalize
    }
}
