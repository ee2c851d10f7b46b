//! Byte-stream capability for SerialMuxProt sessions.
//!
//! A session multiplexes its channels over exactly one point-to-point byte
//! link. This crate defines the [`MuxStream`] capability the session
//! borrows — a non-blocking `available`/`read` pair plus a
//! blocking-until-buffered `write` — together with the transports that
//! provide it:
//! - Unix domain sockets (one end binds, the other connects)
//! - An in-memory loopback pair for tests and single-process demos
//!
//! This is the lowest layer of serialmuxprot. Everything else builds on
//! top of the [`MuxStream`] trait provided here.

pub mod error;
pub mod pipe;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use pipe::LoopbackPipe;
pub use traits::MuxStream;

#[cfg(unix)]
pub use uds::{SocketStream, UnixDomainSocket};
