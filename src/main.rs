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

use clap::{Parser, Subcommand};
use log::{error, info};
use serialport::{DataBits, Parity, StopBits};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use uart_transfer::device::{run_device, DeviceIo, DeviceOptions};
use uart_transfer::protocol::{IDLE_THRESHOLD_TICKS, MAX_PAYLOAD_LEN};
use uart_transfer::sender::{self, SenderFsm, SenderOptions};
use uart_transfer::serial::RealSerialPort;
use uart_transfer::storage::ImageStorage;

#[derive(Parser)]
#[command(name = "uart-transfer")]
#[command(about = "Stream a binary image into external storage over a serial link", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Serial port to use (e.g., /dev/ttyUSB0 or COM1)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "115200")]
    baud: u32,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name="BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name="BITS")]
    stop_bits: u8,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an image to a device
    Send {
        /// Image file to send
        file: PathBuf,

        /// Storage offset announced in BEGIN (decimal or 0x-prefixed hex)
        #[arg(long, default_value = "0", value_parser = parse_offset)]
        offset: u32,

        /// Payload bytes per DATA frame
        #[arg(long, default_value_t = MAX_PAYLOAD_LEN)]
        chunk: usize,

        /// Resends of one frame before giving up
        #[arg(long, default_value = "3")]
        retries: u32,

        /// How long to wait for each ACK
        #[arg(long, default_value = "1000", value_name = "MS")]
        ack_timeout_ms: u64,
    },
    /// Act as the device: receive an image into a file
    Receive {
        /// Image file standing in for external storage
        image: PathBuf,

        /// Storage size in bytes; writes past it report storage full
        #[arg(long)]
        capacity: Option<u64>,

        /// Timer tick interval
        #[arg(long, default_value = "1000", value_name = "US")]
        tick_us: u64,

        /// Quiet ticks that end a frame
        #[arg(long, default_value_t = IDLE_THRESHOLD_TICKS)]
        idle_ticks: u16,

        /// Exit after the first completed transfer
        #[arg(long)]
        once: bool,
    },
}

fn parse_data_bits(bits: u8) -> Result<DataBits, String> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(format!("Invalid data bits: {}. Must be 5, 6, 7, or 8", bits)),
    }
}

fn parse_parity(parity: &str) -> Result<Parity, String> {
    match parity.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(format!("Invalid parity: {}. Must be 'none', 'odd', or 'even'", parity)),
    }
}

fn parse_stop_bits(bits: u8) -> Result<StopBits, String> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(format!("Invalid stop bits: {}. Must be 1 or 2", bits)),
    }
}

fn parse_offset(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("Invalid offset '{}': {}", s, e))
}

fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let settings = parse_data_bits(cli.data_bits).and_then(|data_bits| {
        Ok((data_bits, parse_parity(&cli.parity)?, parse_stop_bits(cli.stop_bits)?))
    });
    let (data_bits, parity, stop_bits) = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Opening serial port: {}", cli.port);
    info!("Settings: {} baud, {:?}, {:?}, {:?}", cli.baud, data_bits, parity, stop_bits);

    let serial_port = match RealSerialPort::open(&cli.port, cli.baud, data_bits, parity, stop_bits) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("Failed to open serial port: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Send { file, offset, chunk, retries, ack_timeout_ms } => {
            let options = SenderOptions {
                offset,
                chunk,
                retries,
                ack_timeout: Duration::from_millis(ack_timeout_ms),
            };
            info!("Sending image: {}", file.display());
            if let Err(e) = send_image(serial_port, file, options) {
                eprintln!("Send failed: {}", e);
                std::process::exit(1);
            }
            info!("Image sent successfully");
        }
        Commands::Receive { image, capacity, tick_us, idle_ticks, once } => {
            let options = DeviceOptions {
                tick: Duration::from_micros(tick_us.max(1)),
                idle_threshold: idle_ticks,
                once,
            };
            info!("Receiving into: {}", image.display());
            if let Err(e) = receive_image(serial_port, image, capacity, options) {
                eprintln!("Receive failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn send_image(serial_port: RealSerialPort, file: PathBuf, options: SenderOptions) -> Result<(), sender::SenderError> {
    let image = std::fs::read(&file).map_err(|e| {
        std::io::Error::new(e.kind(), format!("{}: {}", file.display(), e))
    })?;

    let state = SenderFsm::new(Box::new(serial_port), image, options);
    sender::run_sender(state)
}

fn receive_image(
    serial_port: RealSerialPort,
    image: PathBuf,
    capacity: Option<u64>,
    options: DeviceOptions,
) -> std::io::Result<()> {
    let writer = serial_port.try_clone().map_err(std::io::Error::other)?;
    let storage = ImageStorage::create(&image, capacity)?;
    let io = DeviceIo::new(storage, Box::new(writer));

    let stop = Arc::new(AtomicBool::new(false));
    let (summary, _) = run_device(Box::new(serial_port), io, options, stop)?;

    if summary.rejected > 0 {
        error!("{} of {} frames were rejected", summary.rejected, summary.frames);
    }
    info!("{} frames processed, {} bytes stored", summary.frames, summary.bytes_stored);
    Ok(())
}
