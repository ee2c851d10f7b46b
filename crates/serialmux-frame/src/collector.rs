use bytes::Bytes;
use serialmux_stream::MuxStream;
use tracing::debug;

use crate::codec::{checksum, Frame, HEADER_LEN, MAX_DATA_LEN, MAX_FRAME_LEN};

/// Number of polls a promised payload may stay incomplete before the
/// receive buffer is reset. Bounds the damage of a spurious valid-looking
/// header that promises more bytes than will ever arrive.
pub const MAX_RX_ATTEMPTS: usize = MAX_FRAME_LEN;

/// Reassembles frames out of a byte stream, one poll at a time.
///
/// Each [`poll`](FrameCollector::poll) makes as much progress as the
/// currently available bytes allow and never blocks. Bytes are only
/// consumed once the full outstanding need (header remainder or payload
/// remainder) is available; partial frames persist across polls. Frames
/// that fail the checksum are dropped silently and the buffer is reset so
/// a bad frame cannot poison subsequent ones.
#[derive(Debug)]
pub struct FrameCollector {
    buf: [u8; MAX_FRAME_LEN],
    filled: usize,
    attempts: usize,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_FRAME_LEN],
            filled: 0,
            attempts: 0,
        }
    }

    /// Drop any partial frame and start over.
    pub fn reset(&mut self) {
        self.filled = 0;
        self.attempts = 0;
    }

    /// Attempt to complete one frame from the stream.
    ///
    /// Returns a validated frame if one completed this invocation. A
    /// header and its payload may be consumed back-to-back when the bytes
    /// are already buffered.
    pub fn poll<S: MuxStream>(&mut self, stream: &mut S) -> Option<Frame> {
        let mut dlc = 0usize;
        let mut need = 0usize;
        let mut expecting_header = false;

        if self.filled < HEADER_LEN {
            need = HEADER_LEN - self.filled;
            expecting_header = true;
        } else {
            dlc = self.buf[1] as usize;
            if dlc_in_range(dlc) && self.attempts <= MAX_RX_ATTEMPTS {
                need = HEADER_LEN + dlc - self.filled;
                self.attempts += 1;
            }
        }

        if need == 0 {
            // Header promised an impossible DLC, or the payload never
            // arrived within the attempts budget.
            debug!(
                filled = self.filled,
                attempts = self.attempts,
                "resetting rx buffer"
            );
            self.reset();
            return None;
        }

        self.read_if_available(stream, need);

        if expecting_header && self.filled == HEADER_LEN {
            dlc = self.buf[1] as usize;
            if !dlc_in_range(dlc) {
                debug!(dlc, "header carries invalid DLC, resetting rx buffer");
                self.reset();
                return None;
            }
            self.attempts += 1;
            let remaining = HEADER_LEN + dlc - self.filled;
            if remaining > 0 {
                self.read_if_available(stream, remaining);
            }
        }

        if dlc != 0 && self.filled == HEADER_LEN + dlc {
            let frame = self.finish(dlc);
            self.reset();
            return frame;
        }

        None
    }

    /// Read exactly `need` bytes, but only if the stream already has them.
    /// Short reads leave the remainder for the next poll.
    fn read_if_available<S: MuxStream>(&mut self, stream: &mut S, need: usize) {
        let available = stream.bytes_available().unwrap_or(0);
        if available < need {
            return;
        }
        if let Ok(count) = stream.read(&mut self.buf[self.filled..self.filled + need]) {
            self.filled += count;
        }
    }

    fn finish(&self, dlc: usize) -> Option<Frame> {
        let channel = self.buf[0];
        let payload = &self.buf[HEADER_LEN..HEADER_LEN + dlc];
        let expected = checksum(channel, payload);
        if expected != self.buf[2] {
            debug!(
                channel,
                expected,
                found = self.buf[2],
                "dropping frame with bad checksum"
            );
            return None;
        }
        Some(Frame {
            channel,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

impl Default for FrameCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn dlc_in_range(dlc: usize) -> bool {
    dlc != 0 && dlc <= MAX_DATA_LEN
}
