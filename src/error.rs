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

//! Frame-level error types

/// Why a received buffer was rejected as a frame.
///
/// Every variant is reported to the sender as `ResultCode::VerifyError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("bad frame head")]
    BadHeader,

    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("payload length {length} exceeds maximum {max}")]
    LengthTooLarge { length: usize, max: usize },

    #[error("checksum mismatch: computed 0x{expected:02X}, frame carries 0x{found:02X}")]
    BadChecksum { expected: u8, found: u8 },

    #[error("bad frame tail")]
    BadTrailer,
}

/// Why a frame could not be written into an output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("payload length {length} exceeds maximum {max}")]
    PayloadTooLarge { length: usize, max: usize },

    #[error("output buffer holds {available} bytes, frame needs {needed}")]
    BufferTooSmall { needed: usize, available: usize },
}
