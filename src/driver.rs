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

//! Main-loop driver
//!
//! The driver is the only consumer of completed frames. Each frame moves it
//! through `Idle -> Decoding -> AckPending -> Idle`, and every frame,
//! valid or not, is answered with exactly one ACK. `step` makes one
//! transition at a time; `poll` runs a whole frame.

use log::{debug, warn};
use crate::ack::{send_ack, Ack};
use crate::decoder::{command_byte, decode};
use crate::dispatch::Session;
use crate::io::TransferIo;
use crate::protocol::{ResultCode, FRAME_OVERHEAD};
use crate::rx::Receiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Waiting for the receiver to flag a complete frame
    Idle,
    /// Frame taken from the receiver, being validated and dispatched
    Decoding,
    /// Result known, ACK not yet handed to the transport
    AckPending,
}

pub struct Driver<'a, T: TransferIo, const N: usize> {
    rx: &'a Receiver<N>,
    io: T,
    session: Session,
    frame: [u8; N],
    frame_len: usize,
    pending: Option<Ack>,
    state: DriverState,
}

impl<'a, T: TransferIo, const N: usize> Driver<'a, T, N> {
    pub fn new(rx: &'a Receiver<N>, io: T) -> Self {
        Driver {
            rx,
            io,
            session: Session::new(),
            frame: [0; N],
            frame_len: 0,
            pending: None,
            state: DriverState::Idle,
        }
    }

    /// Largest payload that fits the receive buffer.
    pub fn max_payload(&self) -> usize {
        N.saturating_sub(FRAME_OVERHEAD)
    }

    /// Where the driver is in the current frame. [`poll`](Self::poll) runs a
    /// frame to completion, so only [`step`](Self::step) leaves it in
    /// `Decoding` or `AckPending`.
    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn io(&self) -> &T {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut T {
        &mut self.io
    }

    pub fn into_io(self) -> T {
        self.io
    }

    /// Makes a single state transition.
    ///
    /// `Idle` takes a completed frame from the receiver (and stays put if
    /// there is none), `Decoding` validates and dispatches it, and
    /// `AckPending` sends the ACK. Returns the ACK on the transition back to
    /// `Idle`.
    pub fn step(&mut self) -> Option<Ack> {
        match self.state {
            DriverState::Idle => {
                let len = self.rx.take_frame(&mut self.frame)?;
                debug!("Frame received: {} bytes", len);
                self.frame_len = len;
                self.state = DriverState::Decoding;
                None
            }
            DriverState::Decoding => {
                let buf = &self.frame[..self.frame_len];
                let command = command_byte(buf);
                let result = match decode(buf, self.max_payload()) {
                    Ok(frame) => self.session.dispatch(&frame, &mut self.io),
                    Err(e) => {
                        warn!("Rejected frame (command 0x{:02X}): {}", command, e);
                        ResultCode::VerifyError
                    }
                };
                self.pending = Some(Ack { command, result });
                self.state = DriverState::AckPending;
                None
            }
            DriverState::AckPending => {
                self.state = DriverState::Idle;
                let pending = self.pending.take()?;
                Some(send_ack(&mut self.io, pending.command, pending.result))
            }
        }
    }

    /// Processes one completed frame if the receiver has one.
    ///
    /// Returns the ACK that was sent, or `None` when no frame was ready.
    pub fn poll(&mut self) -> Option<Ack> {
        loop {
            let idle = self.state == DriverState::Idle;
            if let Some(ack) = self.step() {
                return Some(ack);
            }
            if idle && self.state == DriverState::Idle {
                return None;
            }
        }
    }

    /// Busy-waits for the next frame, processes it and returns its ACK.
    pub fn run_once(&mut self) -> Ack {
        loop {
            if let Some(ack) = self.poll() {
                return ack;
            }
            core::hint::spin_loop();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
