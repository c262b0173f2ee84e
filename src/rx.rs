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

//! Receive buffer and inactivity timer
//!
//! [`Receiver`] is the only state shared between the byte-arrival
//! interrupt, the tick interrupt and the main loop. Every access goes
//! through one short critical section, so a `Receiver` can sit in a
//! `static` and be called from all three contexts.

use core::cell::RefCell;
use critical_section::Mutex;

// ============================================================================
// Shared State
// ============================================================================

struct RxState<const N: usize> {
    buf: [u8; N],
    tail: usize,
    receiving: bool,
    idle_ticks: u16,
    frame_ready: bool,
}

impl<const N: usize> RxState<N> {
    fn reset(&mut self) {
        self.tail = 0;
        self.receiving = false;
        self.idle_ticks = 0;
        self.frame_ready = false;
    }
}

/// Bounded byte accumulator with tick-driven frame completion.
pub struct Receiver<const N: usize> {
    state: Mutex<RefCell<RxState<N>>>,
    idle_threshold: u16,
}

impl<const N: usize> Receiver<N> {
    pub const fn new(idle_threshold: u16) -> Self {
        Receiver {
            state: Mutex::new(RefCell::new(RxState {
                buf: [0; N],
                tail: 0,
                receiving: false,
                idle_ticks: 0,
                frame_ready: false,
            })),
            idle_threshold,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Appends one received byte. Call from the byte-arrival interrupt.
    ///
    /// The byte is dropped while a completed frame waits to be taken.
    /// A byte arriving at a full buffer wraps the cursor to 0 first,
    /// abandoning the frame in progress.
    pub fn push_byte(&self, byte: u8) {
        critical_section::with(|cs| {
            let mut rx = self.state.borrow_ref_mut(cs);
            if rx.frame_ready {
                return;
            }
            if rx.tail >= N {
                rx.tail = 0;
            }
            let tail = rx.tail;
            rx.buf[tail] = byte;
            rx.tail += 1;
            rx.receiving = true;
            rx.idle_ticks = 0;
        });
    }

    /// Advances the idle counter. Call once per tick interval.
    ///
    /// Once more than `idle_threshold` ticks pass without a byte the
    /// buffer is flagged as a complete frame. Returns `true` on the tick
    /// that raised the flag.
    pub fn tick(&self) -> bool {
        critical_section::with(|cs| {
            let mut rx = self.state.borrow_ref_mut(cs);
            if !rx.receiving {
                return false;
            }
            rx.idle_ticks = rx.idle_ticks.saturating_add(1);
            if rx.idle_ticks > self.idle_threshold {
                rx.frame_ready = true;
                rx.receiving = false;
                rx.idle_ticks = 0;
                true
            } else {
                false
            }
        })
    }

    pub fn is_frame_ready(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).frame_ready)
    }

    /// Bytes accumulated since the last reset.
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).tail)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies a completed frame into `out` and resets the receiver.
    ///
    /// Returns the number of bytes copied, or `None` when no frame is
    /// ready. New bytes are accepted again as soon as this returns.
    pub fn take_frame(&self, out: &mut [u8; N]) -> Option<usize> {
        critical_section::with(|cs| {
            let mut rx = self.state.borrow_ref_mut(cs);
            if !rx.frame_ready {
                return None;
            }
            let len = rx.tail;
            out[..len].copy_from_slice(&rx.buf[..len]);
            rx.reset();
            Some(len)
        })
    }

    /// Discards buffered bytes and returns to the idle state.
    pub fn clear(&self) {
        critical_section::with(|cs| {
            let mut rx = self.state.borrow_ref_mut(cs);
            rx.buf.fill(0);
            rx.reset();
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<const N: usize>(rx: &Receiver<N>, bytes: &[u8]) {
        for &b in bytes {
            rx.push_byte(b);
        }
    }

    #[test]
    fn test_frame_ready_after_threshold() {
        let rx = Receiver::<16>::new(10);
        feed(&rx, &[1, 2, 3]);

        for _ in 0..10 {
            assert!(!rx.tick());
        }
        assert!(!rx.is_frame_ready());

        assert!(rx.tick());
        assert!(rx.is_frame_ready());
    }

    #[test]
    fn test_frame_ready_exactly_once() {
        let rx = Receiver::<16>::new(10);
        feed(&rx, &[1, 2, 3]);

        let raised = (0..50).filter(|_| rx.tick()).count();
        assert_eq!(raised, 1);
        assert!(rx.is_frame_ready());
    }

    #[test]
    fn test_tick_without_bytes_does_nothing() {
        let rx = Receiver::<16>::new(10);
        for _ in 0..100 {
            assert!(!rx.tick());
        }
        assert!(!rx.is_frame_ready());
    }

    #[test]
    fn test_byte_resets_idle_counter() {
        let rx = Receiver::<16>::new(10);
        rx.push_byte(1);
        for _ in 0..9 {
            rx.tick();
        }
        rx.push_byte(2);
        for _ in 0..10 {
            assert!(!rx.tick());
        }
        assert!(rx.tick());

        let mut out = [0u8; 16];
        assert_eq!(rx.take_frame(&mut out), Some(2));
        assert_eq!(&out[..2], &[1, 2]);
    }

    #[test]
    fn test_bytes_dropped_while_frame_pending() {
        let rx = Receiver::<16>::new(2);
        feed(&rx, &[7, 8]);
        while !rx.tick() {}

        feed(&rx, &[9, 9, 9]);
        assert_eq!(rx.len(), 2);

        let mut out = [0u8; 16];
        assert_eq!(rx.take_frame(&mut out), Some(2));
        assert_eq!(&out[..2], &[7, 8]);
    }

    #[test]
    fn test_take_frame_resets_state() {
        let rx = Receiver::<16>::new(1);
        let mut out = [0u8; 16];
        assert_eq!(rx.take_frame(&mut out), None);

        feed(&rx, &[1, 2, 3, 4]);
        while !rx.tick() {}
        assert_eq!(rx.take_frame(&mut out), Some(4));

        assert!(!rx.is_frame_ready());
        assert!(rx.is_empty());
        assert_eq!(rx.take_frame(&mut out), None);

        feed(&rx, &[5]);
        while !rx.tick() {}
        assert_eq!(rx.take_frame(&mut out), Some(1));
        assert_eq!(out[0], 5);
    }

    #[test]
    fn test_overflow_wraps_cursor() {
        let rx = Receiver::<8>::new(10);
        feed(&rx, &[0xEE; 8]);
        assert_eq!(rx.len(), 8);

        feed(&rx, &[1, 2, 3]);
        assert_eq!(rx.len(), 3);
        while !rx.tick() {}

        let mut out = [0u8; 8];
        assert_eq!(rx.take_frame(&mut out), Some(3));
        assert_eq!(&out[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_massive_overrun_is_contained() {
        let rx = Receiver::<8>::new(10);
        for i in 0..10_000u32 {
            rx.push_byte(i as u8);
        }
        assert!(rx.len() <= rx.capacity());
    }

    #[test]
    fn test_clear() {
        let rx = Receiver::<8>::new(1);
        feed(&rx, &[1, 2, 3]);
        while !rx.tick() {}
        rx.clear();

        assert!(!rx.is_frame_ready());
        assert!(rx.is_empty());
        rx.push_byte(4);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_concurrent_producers() {
        use std::sync::Arc;
        use std::thread;

        let rx = Arc::new(Receiver::<64>::new(u16::MAX));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rx = Arc::clone(&rx);
                thread::spawn(move || {
                    for _ in 0..8 {
                        rx.push_byte(0xAB);
                        rx.tick();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(rx.len(), 32);
        assert!(!rx.is_frame_ready());
    }

    #[test]
    fn test_static_receiver() {
        static RX: Receiver<16> = Receiver::new(2);

        std::thread::spawn(|| {
            for b in [0xC5, 0x5C, 0x02] {
                RX.push_byte(b);
            }
        })
        .join()
        .unwrap();

        assert!(!RX.tick());
        assert!(!RX.tick());
        assert!(RX.tick());

        let mut frame = [0u8; 16];
        assert_eq!(RX.take_frame(&mut frame), Some(3));
        assert_eq!(&frame[..3], &[0xC5, 0x5C, 0x02]);
    }
}
