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

//! Image storage on the host
//!
//! Stands in for the external flash of a real device: positional writes
//! into a file, optionally bounded so a transfer can run out of space.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

pub struct ImageStorage<W> {
    inner: W,
    capacity: Option<u64>,
}

impl ImageStorage<File> {
    /// Opens (or creates) an image file without truncating it.
    pub fn create(path: &Path, capacity: Option<u64>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        Ok(Self::new(file, capacity))
    }
}

impl<W: Write + Seek> ImageStorage<W> {
    pub fn new(inner: W, capacity: Option<u64>) -> Self {
        ImageStorage { inner, capacity }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Writes as much of `bytes` at `offset` as fits below the capacity.
    pub fn write_at(&mut self, bytes: &[u8], offset: u32) -> std::io::Result<usize> {
        let offset = u64::from(offset);
        let room = match self.capacity {
            Some(cap) => cap.saturating_sub(offset),
            None => u64::MAX,
        };
        let count = bytes.len().min(usize::try_from(room).unwrap_or(usize::MAX));
        if count == 0 {
            return Ok(0);
        }

        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(&bytes[..count])?;
        Ok(count)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_at_offsets() {
        let mut storage = ImageStorage::new(Cursor::new(Vec::new()), None);
        assert_eq!(storage.write_at(&[1, 2, 3], 4).unwrap(), 3);
        assert_eq!(storage.write_at(&[9], 0).unwrap(), 1);

        let data = storage.into_inner().into_inner();
        assert_eq!(data, vec![9, 0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_capacity_cuts_writes_short() {
        let mut storage = ImageStorage::new(Cursor::new(Vec::new()), Some(6));
        assert_eq!(storage.write_at(&[1, 2, 3, 4], 0).unwrap(), 4);
        assert_eq!(storage.write_at(&[5, 6, 7, 8], 4).unwrap(), 2);
        assert_eq!(storage.write_at(&[9], 6).unwrap(), 0);
        assert_eq!(storage.write_at(&[9], 100).unwrap(), 0);

        let data = storage.into_inner().into_inner();
        assert_eq!(data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_file_backed_storage() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("image.bin");

        let mut storage = ImageStorage::create(&path, None).expect("Should create image");
        storage.write_at(b"world", 6).unwrap();
        storage.write_at(b"hello ", 0).unwrap();
        storage.flush().unwrap();
        drop(storage);

        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");

        // Reopening keeps earlier contents
        let mut storage = ImageStorage::create(&path, None).unwrap();
        storage.write_at(b"W", 6).unwrap();
        drop(storage);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello World");
    }
}
