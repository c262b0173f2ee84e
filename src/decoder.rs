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

//! Frame validation
//!
//! Checks run in wire order and stop at the first mismatch: head, length,
//! BCC, tail. Every index is bounded by the bytes actually received.

use crate::error::DecodeError;
use crate::protocol::*;

/// A validated frame borrowed from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub command: u8,
    pub payload: &'a [u8],
}

impl Frame<'_> {
    pub fn command(&self) -> Command {
        Command::from_byte(self.command)
    }
}

/// Command byte to echo in the ACK, even for a frame that failed to decode.
pub fn command_byte(buf: &[u8]) -> u8 {
    buf.get(2).copied().unwrap_or(0)
}

/// Validates `buf` as one frame carrying at most `max_payload` bytes.
pub fn decode(buf: &[u8], max_payload: usize) -> Result<Frame<'_>, DecodeError> {
    if buf.len() < 2 || buf[0] != FRAME_HEAD_1 || buf[1] != FRAME_HEAD_2 {
        return Err(DecodeError::BadHeader);
    }

    if buf.len() < PAYLOAD_OFFSET {
        return Err(DecodeError::Truncated {
            needed: FRAME_OVERHEAD,
            available: buf.len(),
        });
    }

    let length = u16::from_be_bytes([buf[3], buf[4]]) as usize;
    if length > max_payload {
        return Err(DecodeError::LengthTooLarge {
            length,
            max: max_payload,
        });
    }

    let needed = length + FRAME_OVERHEAD;
    if buf.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            available: buf.len(),
        });
    }

    let end = PAYLOAD_OFFSET + length;
    let expected = bcc(&buf[2..end]);
    let found = buf[end];
    if expected != found {
        return Err(DecodeError::BadChecksum { expected, found });
    }

    if buf[end + 1] != FRAME_TAIL_1 || buf[end + 2] != FRAME_TAIL_2 {
        return Err(DecodeError::BadTrailer);
    }

    Ok(Frame {
        command: buf[2],
        payload: &buf[PAYLOAD_OFFSET..end],
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Vec<u8> {
        vec![0xC5, 0x5C, 0x00, 0x00, 0x04, 0xAA, 0xBB, 0xCC, 0xDD, 0x04, 0x5A, 0xA5]
    }

    #[test]
    fn test_decode_header_sample() {
        let buf = sample_frame();
        let frame = decode(&buf, MAX_PAYLOAD_LEN).expect("sample frame should decode");
        assert_eq!(frame.command(), Command::Data);
        assert_eq!(frame.payload, &[0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn test_round_trip() {
        let payloads: [&[u8]; 4] = [&[], &[0x00], b"some image bytes", &[0x5A; MAX_PAYLOAD_LEN]];
        for payload in payloads {
            for cmd in [Command::DATA, Command::BEGIN, Command::END, 0x42] {
                let buf = frame_to_vec(cmd, payload).unwrap();
                let frame = decode(&buf, MAX_PAYLOAD_LEN).expect("encoded frame should decode");
                assert_eq!(frame.command, cmd);
                assert_eq!(frame.payload, payload);
            }
        }
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut buf = sample_frame();
        buf.extend_from_slice(&[0x00, 0x11, 0x22]);
        assert!(decode(&buf, MAX_PAYLOAD_LEN).is_ok());
    }

    #[test]
    fn test_single_bit_corruption_detected() {
        let good = frame_to_vec(Command::DATA, b"\x01\x02\x03\x04\x05").unwrap();
        let bcc_index = good.len() - 3;

        for index in 2..=bcc_index {
            for bit in 0..8 {
                let mut buf = good.clone();
                buf[index] ^= 1 << bit;
                assert!(
                    decode(&buf, MAX_PAYLOAD_LEN).is_err(),
                    "flip of bit {} at byte {} went unnoticed",
                    bit,
                    index
                );
            }
        }
    }

    #[test]
    fn test_sentinel_corruption_detected() {
        let good = frame_to_vec(Command::BEGIN, &[0, 0, 0, 0]).unwrap();
        let last = good.len() - 1;

        for (index, expected) in [
            (0, DecodeError::BadHeader),
            (1, DecodeError::BadHeader),
            (last - 1, DecodeError::BadTrailer),
            (last, DecodeError::BadTrailer),
        ] {
            let mut buf = good.clone();
            buf[index] ^= 0xFF;
            assert_eq!(decode(&buf, MAX_PAYLOAD_LEN), Err(expected));
        }
    }

    #[test]
    fn test_bad_checksum_reports_values() {
        let mut buf = sample_frame();
        buf[9] = 0x05;
        assert_eq!(
            decode(&buf, MAX_PAYLOAD_LEN),
            Err(DecodeError::BadChecksum { expected: 0x04, found: 0x05 })
        );
    }

    #[test]
    fn test_length_above_max_rejected() {
        let mut buf = vec![0xC5, 0x5C, 0x00, 0xFF, 0xFF];
        buf.resize(64, 0);
        assert_eq!(
            decode(&buf, MAX_PAYLOAD_LEN),
            Err(DecodeError::LengthTooLarge { length: 0xFFFF, max: MAX_PAYLOAD_LEN })
        );
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let buf = sample_frame();
        assert_eq!(
            decode(&buf[..10], MAX_PAYLOAD_LEN),
            Err(DecodeError::Truncated { needed: 12, available: 10 })
        );
        assert_eq!(
            decode(&buf[..3], MAX_PAYLOAD_LEN),
            Err(DecodeError::Truncated { needed: 8, available: 3 })
        );
        assert_eq!(decode(&buf[..1], MAX_PAYLOAD_LEN), Err(DecodeError::BadHeader));
        assert_eq!(decode(&[], MAX_PAYLOAD_LEN), Err(DecodeError::BadHeader));
    }

    #[test]
    fn test_command_byte() {
        assert_eq!(command_byte(&sample_frame()), 0x00);
        assert_eq!(command_byte(&[0xC5, 0x5C, 0x02]), 0x02);
        assert_eq!(command_byte(&[0xC5]), 0x00);
    }
}
