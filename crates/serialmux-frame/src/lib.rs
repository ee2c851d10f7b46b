//! SerialMuxProt frame codec and receive state machine.
//!
//! Every message on the link is framed with:
//! - A 1-byte channel id (0 is the control channel)
//! - A 1-byte DLC (payload length, 1..=32)
//! - A 1-byte checksum over channel, DLC and payload, modulo 255
//!
//! The [`FrameCollector`] reassembles frames from whatever bytes the
//! stream currently has, without ever blocking; partial frames persist
//! across polls.

pub mod codec;
pub mod collector;
pub mod error;

pub use codec::{
    checksum, decode_frame, encode_frame, validate, Frame, CONTROL_CHANNEL, HEADER_LEN,
    MAX_DATA_LEN, MAX_FRAME_LEN,
};
pub use collector::{FrameCollector, MAX_RX_ATTEMPTS};
pub use error::{FrameError, Result};
