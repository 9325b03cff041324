// SPDX-License-Identifier: GPL-3.0-or-later

// Byte-level framer fed one byte at a time from the UART RX interrupt.
// Grounded on the reference firmware's `SharedWithInterrupt` single-slot
// producer/consumer handoff, generalized from a plain value swap to a
// growable-then-frozen byte buffer with its own small state machine.

use heapless::Vec;

use crate::consts::serial::FRAME_BUFFER_LEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    WaitingForStart,
    Accumulating,
}

pub struct FrameCodec {
    state: State,
    buf: Vec<u8, FRAME_BUFFER_LEN>,
    ready: Option<Vec<u8, FRAME_BUFFER_LEN>>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self { state: State::WaitingForStart, buf: Vec::new(), ready: None }
    }

    /// Called from the RX ISR for every received byte. `<` always resets
    /// the in-progress frame (even mid-frame -- a stray leading byte
    /// resynchronizes rather than desyncing forever). `>` freezes the
    /// accumulated bytes into the ready slot iff one isn't already pending;
    /// the producer never overwrites an unconsumed frame (spec's
    /// single-producer/single-consumer handshake).
    pub fn on_byte(&mut self, byte: u8) {
        match byte {
            b'<' => {
                self.buf.clear();
                self.state = State::Accumulating;
            }
            b'>' => {
                if self.state == State::Accumulating && self.ready.is_none() {
                    self.ready = Some(self.buf.clone());
                }
                self.buf.clear();
                self.state = State::WaitingForStart;
            }
            b'\r' | b'\n' if self.state == State::Accumulating => {}
            _ => {
                if self.state == State::Accumulating {
                    if self.buf.push(byte).is_err() {
                        // Overflow: drop the in-progress frame silently and
                        // wait for the next `<` to resynchronize.
                        self.buf.clear();
                        self.state = State::WaitingForStart;
                    }
                }
            }
        }
    }

    /// Called once per main-loop pass. Takes and clears the ready frame, if
    /// any, leaving the codec free to accept a new one.
    pub fn take_ready(&mut self) -> Option<Vec<u8, FRAME_BUFFER_LEN>> {
        self.ready.take()
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(codec: &mut FrameCodec, s: &str) {
        for b in s.bytes() {
            codec.on_byte(b);
        }
    }

    #[test]
    fn complete_frame_becomes_ready() {
        let mut c = FrameCodec::new();
        feed(&mut c, "<M:10,20>");
        let frame = c.take_ready().unwrap();
        assert_eq!(&frame[..], b"M:10,20");
    }

    #[test]
    fn bytes_outside_brackets_are_discarded() {
        let mut c = FrameCodec::new();
        feed(&mut c, "garbage<S>more garbage");
        let frame = c.take_ready().unwrap();
        assert_eq!(&frame[..], b"S");
    }

    #[test]
    fn crlf_within_a_frame_is_ignored() {
        let mut c = FrameCodec::new();
        feed(&mut c, "<M:10\r\n,20>");
        let frame = c.take_ready().unwrap();
        assert_eq!(&frame[..], b"M:10,20");
    }

    #[test]
    fn truncated_frame_then_new_start_resynchronizes() {
        let mut c = FrameCodec::new();
        feed(&mut c, "abc<M:10");
        assert!(c.take_ready().is_none());
        feed(&mut c, "<S>");
        let frame = c.take_ready().unwrap();
        assert_eq!(&frame[..], b"S");
    }

    #[test]
    fn unconsumed_frame_is_not_overwritten() {
        let mut c = FrameCodec::new();
        feed(&mut c, "<S>");
        feed(&mut c, "<M:1,2>");
        let frame = c.take_ready().unwrap();
        assert_eq!(&frame[..], b"S");
        assert!(c.take_ready().is_none());
    }

    #[test]
    fn overflow_drops_in_progress_frame() {
        let mut c = FrameCodec::new();
        c.on_byte(b'<');
        for _ in 0..(FRAME_BUFFER_LEN + 10) {
            c.on_byte(b'x');
        }
        c.on_byte(b'>');
        // The frame overflowed and was dropped before '>' arrived, so the
        // '>' closes an empty, already-reset buffer.
        assert!(c.take_ready().is_none());
    }
}
