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

//! Device side on a host
//!
//! Runs the receive pipeline the way a microcontroller would: a reader
//! thread plays the byte-arrival interrupt, a ticker thread plays the
//! periodic timer, and the calling thread runs the driver loop.

use std::io::{Seek, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use log::{debug, error, info};
use crate::driver::Driver;
use crate::io::TransferIo;
use crate::protocol::{Command, ResultCode, FRAME_CAPACITY};
use crate::rx::Receiver;
use crate::serial::SerialPort;
use crate::storage::ImageStorage;

const READ_POLL: Duration = Duration::from_millis(10);

// ============================================================================
// Collaborators
// ============================================================================

/// Image file as storage, serial port as transport.
pub struct DeviceIo<W> {
    storage: ImageStorage<W>,
    serial: Box<dyn SerialPort>,
}

impl<W: Write + Seek> DeviceIo<W> {
    pub fn new(storage: ImageStorage<W>, serial: Box<dyn SerialPort>) -> Self {
        DeviceIo { storage, serial }
    }

    pub fn into_storage(self) -> ImageStorage<W> {
        self.storage
    }
}

impl<W: Write + Seek> TransferIo for DeviceIo<W> {
    fn write_storage(&mut self, bytes: &[u8], offset: u32) -> usize {
        match self.storage.write_at(bytes, offset) {
            Ok(n) => n,
            Err(e) => {
                error!("Image write at 0x{:08X} failed: {}", offset, e);
                0
            }
        }
    }

    fn send_transport(&mut self, bytes: &[u8]) -> usize {
        match self.serial.write_all(bytes) {
            Ok(()) => bytes.len(),
            Err(e) => {
                error!("Serial write failed: {}", e);
                0
            }
        }
    }

    fn finalize(&mut self, _base_offset: u32, _bytes_stored: u32) -> bool {
        match self.storage.flush() {
            Ok(()) => true,
            Err(e) => {
                error!("Image flush failed: {}", e);
                false
            }
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct DeviceOptions {
    /// Interval between timer ticks
    pub tick: Duration,
    /// Quiet ticks that end a frame
    pub idle_threshold: u16,
    /// Stop after the first successful END
    pub once: bool,
}

/// Counters reported when the device loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSummary {
    pub frames: u32,
    pub rejected: u32,
    pub bytes_stored: u32,
}

/// Runs the device loop until `stop` is raised, the reader fails, or
/// (with `once`) a transfer completes.
pub fn run_device<W: Write + Seek>(
    reader: Box<dyn SerialPort>,
    io: DeviceIo<W>,
    options: DeviceOptions,
    stop: Arc<AtomicBool>,
) -> std::io::Result<(DeviceSummary, DeviceIo<W>)> {
    let rx = Arc::new(Receiver::<FRAME_CAPACITY>::new(options.idle_threshold));

    let uart = {
        let rx = Arc::clone(&rx);
        let stop = Arc::clone(&stop);
        thread::spawn(move || read_loop(reader, &*rx, &stop))
    };

    let timer = {
        let rx = Arc::clone(&rx);
        let stop = Arc::clone(&stop);
        let tick = options.tick;
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(tick);
                if rx.tick() {
                    debug!("Frame boundary detected");
                }
            }
        })
    };

    let mut summary = DeviceSummary::default();
    let mut driver = Driver::new(&*rx, io);

    while !stop.load(Ordering::Relaxed) {
        let Some(ack) = driver.poll() else {
            thread::sleep(options.tick);
            continue;
        };

        summary.frames += 1;
        if ack.result != ResultCode::Ok {
            summary.rejected += 1;
        }
        summary.bytes_stored = driver.session().bytes_stored;

        if options.once && ack.command == Command::END && ack.result == ResultCode::Ok {
            info!("Transfer complete, stopping");
            stop.store(true, Ordering::Relaxed);
        }
    }

    stop.store(true, Ordering::Relaxed);
    let io = driver.into_io();

    if timer.join().is_err() {
        error!("Timer thread panicked");
    }
    match uart.join() {
        Ok(result) => result?,
        Err(_) => error!("Reader thread panicked"),
    }

    Ok((summary, io))
}

fn read_loop<const N: usize>(
    mut reader: Box<dyn SerialPort>,
    rx: &Receiver<N>,
    stop: &AtomicBool,
) -> std::io::Result<()> {
    let mut buf = [0u8; 64];
    while !stop.load(Ordering::Relaxed) {
        match reader.read_timeout(&mut buf, READ_POLL) {
            Ok(n) => {
                for &b in &buf[..n] {
                    rx.push_byte(b);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                error!("Serial read failed: {}", e);
                stop.store(true, Ordering::Relaxed);
                return Err(e);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
