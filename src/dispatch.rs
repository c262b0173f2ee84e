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

//! Command dispatch and transfer session tracking

use log::{debug, info, warn};
use crate::decoder::Frame;
use crate::io::TransferIo;
use crate::protocol::{Command, ResultCode};

/// Write position of the transfer started by the last BEGIN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub base_offset: u32,
    pub bytes_stored: u32,
    pub active: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute storage offset of the next DATA byte, if it fits in 32 bits.
    pub fn next_offset(&self) -> Option<u32> {
        self.base_offset.checked_add(self.bytes_stored)
    }

    /// Applies one validated frame and returns the result for its ACK.
    pub fn dispatch<T: TransferIo>(&mut self, frame: &Frame<'_>, io: &mut T) -> ResultCode {
        match frame.command() {
            Command::Begin => self.begin(frame.payload),
            Command::Data => self.data(frame.payload, io),
            Command::End => self.end(io),
            Command::Ack => {
                warn!("Ignoring ACK frame sent to device");
                ResultCode::Ok
            }
            Command::Reserved(cmd) => {
                warn!("Ignoring reserved command 0x{:02X}", cmd);
                ResultCode::Ok
            }
        }
    }

    fn begin(&mut self, payload: &[u8]) -> ResultCode {
        let Some(offset) = payload.first_chunk::<4>() else {
            warn!("BEGIN payload too short: {} bytes", payload.len());
            return ResultCode::VerifyError;
        };

        self.base_offset = u32::from_be_bytes(*offset);
        self.bytes_stored = 0;
        self.active = true;
        info!("Transfer started at offset 0x{:08X}", self.base_offset);
        ResultCode::Ok
    }

    fn data<T: TransferIo>(&mut self, payload: &[u8], io: &mut T) -> ResultCode {
        if !self.active {
            warn!("DATA frame outside of a BEGIN/END session");
        }

        let Some(offset) = self.next_offset() else {
            warn!("Write offset overflows 32 bits");
            return ResultCode::StorageFull;
        };

        let written = io.write_storage(payload, offset);
        if written < payload.len() {
            warn!(
                "Short write at 0x{:08X}: {} of {} bytes",
                offset,
                written,
                payload.len()
            );
            return ResultCode::StorageFull;
        }

        self.bytes_stored = self.bytes_stored.wrapping_add(payload.len() as u32);
        debug!("Stored {} bytes at 0x{:08X}", payload.len(), offset);
        ResultCode::Ok
    }

    fn end<T: TransferIo>(&mut self, io: &mut T) -> ResultCode {
        self.active = false;
        info!(
            "Transfer finished: {} bytes at offset 0x{:08X}",
            self.bytes_stored, self.base_offset
        );

        if io.finalize(self.base_offset, self.bytes_stored) {
            ResultCode::Ok
        } else {
            warn!("Finalization failed");
            ResultCode::Unknown
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryIo;

    fn frame(command: u8, payload: &[u8]) -> Frame<'_> {
        Frame { command, payload }
    }

    #[test]
    fn test_begin_sets_offset() {
        let mut session = Session::new();
        let mut io = MemoryIo::default();

        let res = session.dispatch(&frame(Command::BEGIN, &[0x00, 0x01, 0x02, 0x03]), &mut io);
        assert_eq!(res, ResultCode::Ok);
        assert_eq!(session.base_offset, 0x0001_0203);
        assert_eq!(session.bytes_stored, 0);
        assert!(session.active);
    }

    #[test]
    fn test_begin_resets_progress() {
        let mut session = Session {
            base_offset: 10,
            bytes_stored: 500,
            active: true,
        };
        let mut io = MemoryIo::default();

        session.dispatch(&frame(Command::BEGIN, &[0, 0, 0, 0]), &mut io);
        assert_eq!(session.base_offset, 0);
        assert_eq!(session.bytes_stored, 0);
    }

    #[test]
    fn test_short_begin_rejected() {
        let mut session = Session {
            base_offset: 7,
            bytes_stored: 3,
            active: true,
        };
        let before = session;
        let mut io = MemoryIo::default();

        let res = session.dispatch(&frame(Command::BEGIN, &[0x01, 0x02]), &mut io);
        assert_eq!(res, ResultCode::VerifyError);
        assert_eq!(session, before);
    }

    #[test]
    fn test_data_writes_sequentially() {
        let mut session = Session::new();
        let mut io = MemoryIo::default();

        session.dispatch(&frame(Command::BEGIN, &[0, 0, 0, 0x10]), &mut io);
        assert_eq!(session.dispatch(&frame(Command::DATA, &[1, 2, 3]), &mut io), ResultCode::Ok);
        assert_eq!(session.dispatch(&frame(Command::DATA, &[4, 5]), &mut io), ResultCode::Ok);

        assert_eq!(io.writes, vec![(0x10, 3), (0x13, 2)]);
        assert_eq!(session.bytes_stored, 5);
        assert_eq!(&io.storage[0x10..0x15], &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_short_write_is_storage_full() {
        let mut session = Session::new();
        let mut io = MemoryIo::with_capacity(6);

        session.dispatch(&frame(Command::BEGIN, &[0, 0, 0, 0]), &mut io);
        assert_eq!(session.dispatch(&frame(Command::DATA, &[1, 2, 3, 4]), &mut io), ResultCode::Ok);
        assert_eq!(
            session.dispatch(&frame(Command::DATA, &[5, 6, 7, 8]), &mut io),
            ResultCode::StorageFull
        );
        assert_eq!(session.bytes_stored, 4);

        // A resend of the same frame lands at the same offset
        session.dispatch(&frame(Command::DATA, &[5, 6, 7, 8]), &mut io);
        assert_eq!(io.writes, vec![(0, 4), (4, 4), (4, 4)]);
    }

    #[test]
    fn test_offset_overflow_is_storage_full() {
        let mut session = Session {
            base_offset: u32::MAX,
            bytes_stored: 1,
            active: true,
        };
        let mut io = MemoryIo::default();

        assert_eq!(
            session.dispatch(&frame(Command::DATA, &[1]), &mut io),
            ResultCode::StorageFull
        );
        assert!(io.writes.is_empty());
    }

    #[test]
    fn test_empty_data_frame() {
        let mut session = Session::new();
        let mut io = MemoryIo::default();

        assert_eq!(session.dispatch(&frame(Command::DATA, &[]), &mut io), ResultCode::Ok);
        assert_eq!(session.bytes_stored, 0);
    }

    #[test]
    fn test_end_finalizes() {
        let mut session = Session::new();
        let mut io = MemoryIo::default();

        session.dispatch(&frame(Command::BEGIN, &[0, 0, 0x01, 0x00]), &mut io);
        session.dispatch(&frame(Command::DATA, &[0xAA; 8]), &mut io);
        assert_eq!(session.dispatch(&frame(Command::END, &[]), &mut io), ResultCode::Ok);

        assert_eq!(io.finalized, Some((0x100, 8)));
        assert!(!session.active);
        assert_eq!(session.bytes_stored, 8);
    }

    #[test]
    fn test_end_finalize_failure() {
        let mut session = Session::new();
        let mut io = MemoryIo {
            fail_finalize: true,
            ..Default::default()
        };

        assert_eq!(session.dispatch(&frame(Command::END, &[]), &mut io), ResultCode::Unknown);
    }

    #[test]
    fn test_unknown_commands_accepted() {
        let mut session = Session::new();
        let mut io = MemoryIo::default();

        for cmd in [0x03, 0x80, 0xFE, Command::ACK] {
            assert_eq!(session.dispatch(&frame(cmd, &[1, 2, 3]), &mut io), ResultCode::Ok);
        }
        assert!(io.writes.is_empty());
        assert_eq!(session, Session::new());
    }
}
