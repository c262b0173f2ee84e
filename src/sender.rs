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

use std::marker::PhantomData;
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use crate::ack::{parse_ack, Ack};
use crate::protocol::*;
use crate::serial::SerialPort;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device rejected command 0x{command:02X} with {result:?}")]
    Rejected { command: u8, result: ResultCode },

    #[error("expected ACK for command 0x{expected:02X}, got one for 0x{got:02X}")]
    UnexpectedAck { expected: u8, got: u8 },

    #[error("no valid ACK for command 0x{command:02X} after {attempts} attempts")]
    RetriesExhausted { command: u8, attempts: u32 },

    #[error("Transfer complete")]
    TransferComplete,
}

// ============================================================================
// States
// ============================================================================

pub struct Begin;
pub struct SendData;
pub struct SendEnd;

// ============================================================================
// FSM Structure
// ============================================================================

/// Knobs for the stop-and-wait exchange.
#[derive(Debug, Clone, Copy)]
pub struct SenderOptions {
    /// Storage offset announced in BEGIN
    pub offset: u32,
    /// Payload bytes per DATA frame
    pub chunk: usize,
    /// Resends of one frame after a bad or missing ACK
    pub retries: u32,
    pub ack_timeout: Duration,
}

impl Default for SenderOptions {
    fn default() -> Self {
        SenderOptions {
            offset: 0,
            chunk: MAX_PAYLOAD_LEN,
            retries: 3,
            ack_timeout: Duration::from_millis(1000),
        }
    }
}

pub struct SenderFsm<State> {
    state: PhantomData<State>,
    serial: Box<dyn SerialPort>,
    image: Vec<u8>,
    position: usize,
    options: SenderOptions,
}

// ============================================================================
// Trait
// ============================================================================

pub trait SenderState: Send {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError>;
}

// ============================================================================
// Helpers shared by all states
// ============================================================================

impl<S> SenderFsm<S> {
    fn transition<T>(self) -> Box<SenderFsm<T>> {
        Box::new(SenderFsm {
            state: PhantomData,
            serial: self.serial,
            image: self.image,
            position: self.position,
            options: self.options,
        })
    }

    fn io_error(&self, e: std::io::Error) -> SenderError {
        let type_name = std::any::type_name::<S>();
        let state_name = type_name.split("::").last().unwrap_or(type_name);
        SenderError::Io(std::io::Error::new(
            e.kind(),
            format!("{} (in state: {})", e, state_name)
        ))
    }

    /// Sends one frame and waits for its ACK, resending on a bad or
    /// missing ACK and on a device-side verification error.
    fn exchange(&mut self, command: u8, payload: &[u8]) -> Result<(), SenderError> {
        let frame = frame_to_vec(command, payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let attempts = self.options.retries + 1;
        let mut ack_lost = false;

        for attempt in 1..=attempts {
            if ack_lost && command == Command::DATA {
                // No sequence numbers: a stored chunk is written again at the next offset
                warn!("Resending DATA after a lost ACK; the device may store this chunk twice");
            }
            self.serial.write_all(&frame).map_err(|e| self.io_error(e))?;
            debug!("Sent: command 0x{:02X}, {} payload bytes (attempt {})", command, payload.len(), attempt);

            let ack = match self.read_ack().map_err(|e| self.io_error(e))? {
                Some(ack) => ack,
                None => {
                    warn!("No valid ACK for command 0x{:02X}, resending", command);
                    ack_lost = true;
                    continue;
                }
            };
            ack_lost = false;

            if ack.command != command {
                return Err(SenderError::UnexpectedAck { expected: command, got: ack.command });
            }

            match ack.result {
                ResultCode::Ok => return Ok(()),
                ResultCode::VerifyError => {
                    warn!("Device reported a corrupt frame, resending");
                }
                result => return Err(SenderError::Rejected { command, result }),
            }
        }

        Err(SenderError::RetriesExhausted { command, attempts })
    }

    /// Reads one ACK frame. `None` on timeout or a malformed ACK.
    ///
    /// Bytes ahead of the frame head are dropped, so the tail of an ACK
    /// that arrived after an earlier timeout cannot shift this read.
    fn read_ack(&mut self) -> std::io::Result<Option<Ack>> {
        let mut buf = [0u8; ACK_FRAME_LEN];
        let mut got = 0;
        let deadline = Instant::now() + self.options.ack_timeout;

        while got < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.serial.read_timeout(&mut buf[got..], remaining) {
                Ok(n) => got = align_to_head(&mut buf, got + n),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        match parse_ack(&buf) {
            Ok(ack) => {
                debug!("Received: ACK [0x{:02X}, {:?}]", ack.command, ack.result);
                Ok(Some(ack))
            }
            Err(e) => {
                warn!("Malformed ACK: {}", e);
                Ok(None)
            }
        }
    }
}

/// Moves the first possible frame head in `buf[..len]` to the front and
/// returns how many bytes are kept. A lone `FRAME_HEAD_1` at the end is kept.
fn align_to_head(buf: &mut [u8], len: usize) -> usize {
    let start = (0..len)
        .find(|&i| buf[i] == FRAME_HEAD_1 && (i + 1 == len || buf[i + 1] == FRAME_HEAD_2))
        .unwrap_or(len);
    if start > 0 {
        debug!("Skipped {} stray bytes before ACK", start);
        buf.copy_within(start..len, 0);
    }
    len - start
}

// ============================================================================
// State Implementations
// ============================================================================

impl SenderState for SenderFsm<Begin> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError> {
        let mut fsm = *self;
        let offset = fsm.options.offset;

        fsm.exchange(Command::BEGIN, &offset.to_be_bytes())?;
        info!("Transfer of {} bytes started at offset 0x{:08X}", fsm.image.len(), offset);

        let next = fsm.transition::<SendData>();
        Ok(next as Box<dyn SenderState>)
    }
}

impl SenderState for SenderFsm<SendData> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError> {
        let mut fsm = *self;

        if fsm.position >= fsm.image.len() {
            let next = fsm.transition::<SendEnd>();
            return Ok(next as Box<dyn SenderState>);
        }

        let end = (fsm.position + fsm.options.chunk).min(fsm.image.len());
        let chunk = fsm.image[fsm.position..end].to_vec();
        fsm.exchange(Command::DATA, &chunk)?;

        fsm.position = end;
        debug!("Progress: {} / {} bytes", fsm.position, fsm.image.len());

        Ok(Box::new(fsm) as Box<dyn SenderState>)
    }
}

impl SenderState for SenderFsm<SendEnd> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, SenderError> {
        let mut fsm = *self;

        fsm.exchange(Command::END, &[])?;
        info!("Transfer finished: {} bytes", fsm.image.len());

        Err(SenderError::TransferComplete)
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl SenderFsm<Begin> {
    pub fn new(serial: Box<dyn SerialPort>, image: Vec<u8>, options: SenderOptions) -> Box<dyn SenderState> {
        let options = SenderOptions {
            chunk: options.chunk.clamp(1, MAX_PAYLOAD_LEN),
            ..options
        };

        Box::new(SenderFsm {
            state: PhantomData::<Begin>,
            serial,
            image,
            position: 0,
            options,
        })
    }
}

/// Steps the sender until the transfer completes or fails.
pub fn run_sender(mut state: Box<dyn SenderState>) -> Result<(), SenderError> {
    loop {
        match state.step() {
            Ok(next) => state = next,
            Err(SenderError::TransferComplete) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
