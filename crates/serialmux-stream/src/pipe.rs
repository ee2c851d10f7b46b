use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use crate::traits::MuxStream;

type SharedQueue = Arc<Mutex<VecDeque<u8>>>;

/// One end of an in-memory byte pipe.
///
/// [`LoopbackPipe::pair`] returns two cross-connected ends: bytes written
/// to one become available on the other. Useful for wiring two sessions
/// together in tests and single-process demos without a real link.
pub struct LoopbackPipe {
    rx: SharedQueue,
    tx: SharedQueue,
}

impl LoopbackPipe {
    /// Create a connected pair of pipe ends.
    pub fn pair() -> (LoopbackPipe, LoopbackPipe) {
        let a = Arc::new(Mutex::new(VecDeque::new()));
        let b = Arc::new(Mutex::new(VecDeque::new()));
        (
            LoopbackPipe {
                rx: Arc::clone(&a),
                tx: Arc::clone(&b),
            },
            LoopbackPipe { rx: b, tx: a },
        )
    }

    fn lock(queue: &SharedQueue) -> std::sync::MutexGuard<'_, VecDeque<u8>> {
        queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MuxStream for LoopbackPipe {
    fn bytes_available(&self) -> io::Result<usize> {
        Ok(Self::lock(&self.rx).len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut queue = Self::lock(&self.rx);
        let mut count = 0;
        while count < buf.len() {
            match queue.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Self::lock(&self.tx).extend(buf.iter().copied());
        Ok(buf.len())
    }
}
