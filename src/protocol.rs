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

//! Wire format of the transfer protocol
//!
//! ```text
//! [0]=C5 [1]=5C [2]=CMD [3..4]=LEN (BE) [5..5+LEN)=PAYLOAD [5+LEN]=BCC [6+LEN]=5A [7+LEN]=A5
//! ```
//!
//! BCC is the XOR of the command byte, both length bytes and every payload
//! byte. For `C5 5C 00 00 04 AA BB CC DD XX 5A A5` the BCC is `0x04`.

use crate::error::EncodeError;

/// First frame head byte
pub const FRAME_HEAD_1: u8 = 0xC5;

/// Second frame head byte
pub const FRAME_HEAD_2: u8 = 0x5C;

/// First frame tail byte
pub const FRAME_TAIL_1: u8 = 0x5A;

/// Second frame tail byte
pub const FRAME_TAIL_2: u8 = 0xA5;

/// Head, command, length, BCC and tail: the bytes around the payload
pub const FRAME_OVERHEAD: usize = 8;

/// Largest payload a frame may carry
pub const MAX_PAYLOAD_LEN: usize = 1000;

/// Receive buffer size needed to hold one maximum-size frame
pub const FRAME_CAPACITY: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD;

/// Idle ticks after the last byte before the buffer is treated as a frame
pub const IDLE_THRESHOLD_TICKS: u16 = 10;

/// Size of every ACK frame on the wire
pub const ACK_FRAME_LEN: usize = FRAME_OVERHEAD + 2;

/// Offset of the first payload byte
pub const PAYLOAD_OFFSET: usize = 5;

/// Command byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Image bytes to store at the session's current position
    Data,
    /// Start of a transfer; payload carries the storage offset
    Begin,
    /// Transfer finished
    End,
    /// Acknowledgement, only ever sent device to host
    Ack,
    /// 0x03..=0xFE
    Reserved(u8),
}

impl Command {
    pub const DATA: u8 = 0x00;
    pub const BEGIN: u8 = 0x01;
    pub const END: u8 = 0x02;
    pub const ACK: u8 = 0xFF;

    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::DATA => Command::Data,
            Self::BEGIN => Command::Begin,
            Self::END => Command::End,
            Self::ACK => Command::Ack,
            other => Command::Reserved(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Command::Data => Self::DATA,
            Command::Begin => Self::BEGIN,
            Command::End => Self::END,
            Command::Ack => Self::ACK,
            Command::Reserved(b) => b,
        }
    }
}

/// Result code carried in the second ACK payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    /// Bad head, checksum, length or tail
    VerifyError,
    /// Storage accepted fewer bytes than requested
    StorageFull,
    Unknown,
}

impl ResultCode {
    pub fn as_byte(self) -> u8 {
        match self {
            ResultCode::Ok => 0x00,
            ResultCode::VerifyError => 0x01,
            ResultCode::StorageFull => 0x02,
            ResultCode::Unknown => 0xFF,
        }
    }

    /// Any byte outside the defined codes reads as `Unknown`.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => ResultCode::Ok,
            0x01 => ResultCode::VerifyError,
            0x02 => ResultCode::StorageFull,
            _ => ResultCode::Unknown,
        }
    }
}

/// XOR of every byte in `bytes`.
pub fn bcc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Writes a complete frame into `out` and returns its length.
pub fn encode_frame(command: u8, payload: &[u8], out: &mut [u8]) -> Result<usize, EncodeError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EncodeError::PayloadTooLarge {
            length: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let total = payload.len() + FRAME_OVERHEAD;
    if out.len() < total {
        return Err(EncodeError::BufferTooSmall {
            needed: total,
            available: out.len(),
        });
    }

    let len = (payload.len() as u16).to_be_bytes();
    let end = PAYLOAD_OFFSET + payload.len();

    out[0] = FRAME_HEAD_1;
    out[1] = FRAME_HEAD_2;
    out[2] = command;
    out[3] = len[0];
    out[4] = len[1];
    out[PAYLOAD_OFFSET..end].copy_from_slice(payload);
    out[end] = bcc(&out[2..end]);
    out[end + 1] = FRAME_TAIL_1;
    out[end + 2] = FRAME_TAIL_2;

    Ok(total)
}

/// Convenience wrapper around [`encode_frame`] for host-side code.
#[cfg(any(feature = "std", test))]
pub fn frame_to_vec(command: u8, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut out = vec![0u8; payload.len() + FRAME_OVERHEAD];
    encode_frame(command, payload, &mut out)?;
    Ok(out)
}
