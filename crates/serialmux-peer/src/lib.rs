//! SerialMuxProt session layer.
//!
//! Two symmetric peers each run a [`SerialMuxPeer`] over one byte link.
//! Each peer publishes named channels the other subscribes to; the
//! control channel (id 0) carries the SYNC heartbeat handshake and the
//! name-based subscription exchange. User data flows only while the
//! session is synced.
//!
//! The host drives the session by calling
//! [`process`](SerialMuxPeer::process) cyclically with a monotonic
//! millisecond clock; everything else happens synchronously on that call.

pub mod channel;
pub mod control;
pub mod peer;

pub use channel::{ChannelCallback, EventCallback, PendingTable, RxChannelTable, TxChannelTable};
pub use control::{
    display_name, pack_name, ChannelName, ControlMessage, CHANNEL_NAME_MAX_LEN, CMD_SCRB,
    CMD_SCRB_RSP, CMD_SYNC, CMD_SYNC_RSP, CONTROL_CHANNEL_PAYLOAD_LENGTH,
    HEARTBEAT_PERIOD_SYNCED, HEARTBEAT_PERIOD_UNSYNCED,
};
pub use peer::SerialMuxPeer;
