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

//! Framed image transfer over a serial link
//!
//! The device side is a small pipeline: bytes from the UART interrupt land
//! in a [`rx::Receiver`], a periodic tick turns a quiet line into a
//! complete frame, and the [`driver::Driver`] validates it, writes DATA
//! payloads to storage and answers every frame with an ACK.
//!
//! The pipeline (`protocol`, `rx`, `decoder`, `dispatch`, `ack`, `driver`,
//! `io`, `error`) is `no_std`. Build with `default-features = false` for a
//! microcontroller and provide a `critical-section` implementation for the
//! target (for example `cortex-m` with its `critical-section-single-core`
//! feature).
//!
//! ```no_run
//! use uart_transfer::driver::Driver;
//! use uart_transfer::io::TransferIo;
//! use uart_transfer::protocol::{FRAME_CAPACITY, IDLE_THRESHOLD_TICKS};
//! use uart_transfer::rx::Receiver;
//!
//! static RX: Receiver<FRAME_CAPACITY> = Receiver::new(IDLE_THRESHOLD_TICKS);
//!
//! // UART interrupt:  RX.push_byte(byte);
//! // Timer interrupt: RX.tick();
//!
//! fn run_transfer(io: impl TransferIo) -> ! {
//!     let mut driver = Driver::new(&RX, io);
//!     loop {
//!         driver.run_once();
//!     }
//! }
//! ```
//!
//! The host side ([`sender`], [`device`]) drives the same protocol over a
//! real serial port and needs the default `std` feature.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod ack;
pub mod decoder;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod io;
pub mod protocol;
pub mod rx;

#[cfg(feature = "std")]
pub mod device;
#[cfg(feature = "std")]
pub mod sender;
#[cfg(feature = "std")]
pub mod serial;
#[cfg(feature = "std")]
pub mod storage;
