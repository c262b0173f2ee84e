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

//! Acknowledgement frames

use log::{debug, warn};
use crate::decoder::decode;
use crate::error::DecodeError;
use crate::io::TransferIo;
use crate::protocol::*;

/// Decoded contents of an ACK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Command byte of the frame being acknowledged
    pub command: u8,
    pub result: ResultCode,
}

pub fn encode_ack(command: u8, result: ResultCode) -> [u8; ACK_FRAME_LEN] {
    let mut frame = [
        FRAME_HEAD_1,
        FRAME_HEAD_2,
        Command::ACK,
        0x00,
        0x02,
        command,
        result.as_byte(),
        0x00,
        FRAME_TAIL_1,
        FRAME_TAIL_2,
    ];
    frame[7] = bcc(&frame[2..7]);
    frame
}

/// Builds the ACK for one received frame and hands it to the transport.
pub fn send_ack<T: TransferIo>(io: &mut T, command: u8, result: ResultCode) -> Ack {
    let frame = encode_ack(command, result);
    let sent = io.send_transport(&frame);
    if sent < frame.len() {
        warn!("ACK partially sent: {} of {} bytes", sent, frame.len());
    }
    debug!("ACK [0x{:02X}, {:?}]", command, result);
    Ack { command, result }
}

/// Parses an ACK received from the device.
///
/// A well-formed frame with a command other than ACK, or a payload that is
/// not exactly two bytes, is rejected as `BadHeader`.
pub fn parse_ack(buf: &[u8]) -> Result<Ack, DecodeError> {
    let frame = decode(buf, 2)?;
    if frame.command != Command::ACK || frame.payload.len() != 2 {
        return Err(DecodeError::BadHeader);
    }
    Ok(Ack {
        command: frame.payload[0],
        result: ResultCode::from_byte(frame.payload[1]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIo;

    #[test]
    fn test_encode_ack_layout() {
        let frame = encode_ack(Command::BEGIN, ResultCode::Ok);
        assert_eq!(
            frame,
            [0xC5, 0x5C, 0xFF, 0x00, 0x02, 0x01, 0x00, 0xFF ^ 0x02 ^ 0x01, 0x5A, 0xA5]
        );
    }

    #[test]
    fn test_encode_ack_is_valid_frame() {
        let frame = encode_ack(Command::DATA, ResultCode::StorageFull);
        let decoded = decode(&frame, MAX_PAYLOAD_LEN).unwrap();
        assert_eq!(decoded.command, Command::ACK);
        assert_eq!(decoded.payload, &[0x00, 0x02]);
    }

    #[test]
    fn test_send_ack_sends_once() {
        let mut io = MemoryIo::default();
        let ack = send_ack(&mut io, Command::END, ResultCode::VerifyError);

        assert_eq!(ack, Ack { command: Command::END, result: ResultCode::VerifyError });
        assert_eq!(io.sent.len(), 1);
        assert_eq!(io.sent[0], encode_ack(Command::END, ResultCode::VerifyError).to_vec());
    }

    #[test]
    fn test_parse_ack() {
        for result in [
            ResultCode::Ok,
            ResultCode::VerifyError,
            ResultCode::StorageFull,
            ResultCode::Unknown,
        ] {
            let frame = encode_ack(0x42, result);
            assert_eq!(parse_ack(&frame), Ok(Ack { command: 0x42, result }));
        }
    }

    #[test]
    fn test_parse_ack_rejects_other_frames() {
        let data = frame_to_vec(Command::DATA, &[0x00, 0x00]).unwrap();
        assert_eq!(parse_ack(&data), Err(DecodeError::BadHeader));

        let long = frame_to_vec(Command::ACK, &[0x00, 0x00, 0x00]).unwrap();
        assert!(parse_ack(&long).is_err());

        let mut corrupt = encode_ack(Command::DATA, ResultCode::Ok);
        corrupt[6] = 0x01;
        assert!(matches!(parse_ack(&corrupt), Err(DecodeError::BadChecksum { .. })));
    }
}
