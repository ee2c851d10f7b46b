use std::io;

/// The byte-stream capability a SerialMuxProt session drives.
///
/// The session owns the stream exclusively for its whole lifetime; no other
/// component may read from or write to it. All three operations are called
/// from the session's single execution context.
pub trait MuxStream {
    /// Number of bytes that can currently be read without blocking.
    fn bytes_available(&self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes. Must not block; a stream with nothing
    /// buffered returns `Ok(0)`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `buf`, blocking until the bytes are buffered if necessary.
    /// Returns the count actually written; the caller treats anything
    /// short of `buf.len()` as a failed send.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<S: MuxStream + ?Sized> MuxStream for &mut S {
    fn bytes_available(&self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }
}
