use bytes::BytesMut;
use serialmux_frame::{encode_frame, Frame, FrameCollector, CONTROL_CHANNEL, HEADER_LEN};
use serialmux_stream::MuxStream;
use tracing::{debug, trace};

use crate::channel::{
    ChannelCallback, EventCallback, PendingTable, RxChannelTable, TxChannelTable,
};
use crate::control::{
    display_name, pack_name, ChannelName, ControlMessage, CONTROL_CHANNEL_PAYLOAD_LENGTH,
    HEARTBEAT_PERIOD_SYNCED, HEARTBEAT_PERIOD_UNSYNCED,
};

/// One end of a SerialMuxProt session.
///
/// Owns the byte stream for the session's lifetime and multiplexes up to
/// `MAX_CHANNELS` publish and subscribe channels over it. The host calls
/// [`process`](Self::process) cyclically with a monotonic millisecond
/// clock; the session emits its heartbeat, reassembles incoming frames
/// and dispatches them, all without blocking.
///
/// User data sends are gated on the synced state; the session self-heals
/// from a lost peer via the heartbeat and re-announces pending
/// subscriptions every time sync is (re-)acknowledged.
pub struct SerialMuxPeer<S, const MAX_CHANNELS: usize = 10> {
    stream: S,
    collector: FrameCollector,
    tx_channels: TxChannelTable<MAX_CHANNELS>,
    rx_channels: RxChannelTable<MAX_CHANNELS>,
    pending: PendingTable<MAX_CHANNELS>,
    synced: bool,
    last_sync_sent: u32,
    last_sync_acked: u32,
    on_synced: Option<EventCallback>,
    on_desynced: Option<EventCallback>,
}

impl<S: MuxStream, const MAX_CHANNELS: usize> SerialMuxPeer<S, MAX_CHANNELS> {
    /// Create a session over `stream`. The stream must not be used for
    /// anything else while the session lives.
    ///
    /// # Panics
    ///
    /// Panics if `MAX_CHANNELS` is 0 or exceeds 255 (channel ids are one
    /// byte, with 0 reserved for the control channel).
    pub fn new(stream: S) -> Self {
        assert!(
            MAX_CHANNELS >= 1 && MAX_CHANNELS <= 255,
            "MAX_CHANNELS must be in 1..=255"
        );
        Self {
            stream,
            collector: FrameCollector::new(),
            tx_channels: TxChannelTable::new(),
            rx_channels: RxChannelTable::new(),
            pending: PendingTable::new(),
            synced: false,
            last_sync_sent: 0,
            last_sync_acked: 0,
            on_synced: None,
            on_desynced: None,
        }
    }

    /// Drive the session. Call cyclically with a monotonic millisecond
    /// clock; wrap-around is handled by modular subtraction.
    pub fn process(&mut self, now_ms: u32) {
        self.heartbeat(now_ms);
        if let Some(frame) = self.collector.poll(&mut self.stream) {
            self.dispatch(frame);
        }
    }

    /// Create a publish channel and return its 1-based id, or 0 if the
    /// name is empty, the DLC is outside 1..=32, or the table is full.
    /// Channels are never removed; duplicate names are accepted and
    /// peers bind the first match.
    pub fn create_channel(&mut self, name: &str, dlc: u8) -> u8 {
        let id = self.tx_channels.create(name, dlc);
        if id != 0 {
            debug!(name, dlc, id, "created publish channel");
        }
        id
    }

    /// Subscribe to a channel published by the remote peer.
    ///
    /// The subscription is queued and announced once the session is
    /// synced; it stays queued until the peer acknowledges it with a
    /// known channel id, and the callback then receives every payload
    /// arriving on that channel. Returns false if the pending table is
    /// full.
    pub fn subscribe_to_channel(
        &mut self,
        name: &str,
        callback: impl FnMut(&[u8]) + Send + 'static,
    ) -> bool {
        let queued = self.pending.push(pack_name(name), Box::new(callback));
        if queued {
            debug!(name, "queued subscription");
        }
        queued
    }

    /// Send a payload on a publish channel by id. Succeeds only while
    /// synced, for a non-control channel, and when the payload length
    /// matches the channel's DLC exactly.
    pub fn send_data(&mut self, channel: u8, payload: &[u8]) -> bool {
        if channel == CONTROL_CHANNEL || !self.synced {
            return false;
        }
        self.send_frame(channel, payload)
    }

    /// Send a payload on a publish channel by name. Returns false if no
    /// channel carries the name.
    pub fn send_data_by_name(&mut self, name: &str, payload: &[u8]) -> bool {
        match self.tx_channels.lookup(&pack_name(name)) {
            0 => false,
            channel => self.send_data(channel, payload),
        }
    }

    /// Current sync state of the session.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Number of created publish channels (the control channel does not
    /// count).
    pub fn num_tx_channels(&self) -> u8 {
        self.tx_channels.len()
    }

    /// Number of bound subscribe channels.
    pub fn num_rx_channels(&self) -> u8 {
        self.rx_channels.len()
    }

    /// Register a hook fired on every transition into the synced state.
    pub fn on_synced(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_synced = Some(Box::new(callback));
    }

    /// Register a hook fired on every transition out of the synced state.
    pub fn on_desynced(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_desynced = Some(Box::new(callback));
    }

    /// Borrow the underlying stream.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Consume the session and return the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Emit a SYNC challenge whenever the current period has elapsed. An
    /// unanswered previous challenge drops the session out of sync first.
    fn heartbeat(&mut self, now: u32) {
        let period = if self.synced {
            HEARTBEAT_PERIOD_SYNCED
        } else {
            HEARTBEAT_PERIOD_UNSYNCED
        };

        if now.wrapping_sub(self.last_sync_sent) < period {
            return;
        }

        if self.last_sync_sent != self.last_sync_acked {
            debug!(
                sent = self.last_sync_sent,
                acked = self.last_sync_acked,
                "heartbeat went unanswered"
            );
            self.set_synced(false);
        }

        if self.send_control(&ControlMessage::Sync { timestamp: now }) {
            self.last_sync_sent = now;
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        if frame.channel == CONTROL_CHANNEL {
            self.handle_control(frame.payload.as_ref());
        } else {
            let index = usize::from(frame.channel) - 1;
            if !self.rx_channels.dispatch(index, frame.payload.as_ref()) {
                trace!(channel = frame.channel, "dropping frame for unbound channel");
            }
        }
    }

    fn handle_control(&mut self, payload: &[u8]) {
        if payload.len() != CONTROL_CHANNEL_PAYLOAD_LENGTH {
            trace!(len = payload.len(), "ignoring control frame of wrong size");
            return;
        }
        let Some(message) = ControlMessage::decode(payload) else {
            // Unknown command byte.
            return;
        };

        match message {
            ControlMessage::Sync { timestamp } => {
                // Failure is ignored; the peer's next SYNC will retry.
                let _ = self.send_control(&ControlMessage::SyncRsp { timestamp });
            }
            ControlMessage::SyncRsp { timestamp } => {
                if timestamp == self.last_sync_sent {
                    self.last_sync_acked = self.last_sync_sent;
                    self.set_synced(true);
                    self.drain_pending();
                } else {
                    debug!(
                        received = timestamp,
                        expected = self.last_sync_sent,
                        "stale sync response"
                    );
                    self.set_synced(false);
                }
            }
            ControlMessage::Scrb { name } => {
                let channel = self.tx_channels.lookup(&name);
                // The name is always echoed back, resolved or not.
                if !self.send_control(&ControlMessage::ScrbRsp { channel, name }) {
                    self.set_synced(false);
                }
            }
            ControlMessage::ScrbRsp { channel, name } => self.resolve_pending(channel, &name),
        }
    }

    /// Bind an acknowledged subscription, or keep it pending when the
    /// peer answered with channel 0 (it does not publish the name yet;
    /// the next drain retries).
    fn resolve_pending(&mut self, channel: u8, name: &ChannelName) {
        if usize::from(channel) > MAX_CHANNELS {
            return;
        }
        let Some(index) = self.pending.position(name) else {
            return;
        };
        if channel == 0 {
            debug!(name = %display_name(name), "peer does not publish channel yet");
            return;
        }
        if let Some(entry) = self.pending.remove(index) {
            debug!(name = %display_name(name), channel, "subscription bound");
            self.rx_channels
                .bind(usize::from(channel) - 1, entry.callback);
        }
    }

    /// Announce every pending subscription, in table order. A failed
    /// send drops sync and stops the drain.
    fn drain_pending(&mut self) {
        if !self.synced {
            return;
        }
        let names: Vec<ChannelName> = self.pending.names().collect();
        for name in names {
            if !self.send_control(&ControlMessage::Scrb { name }) {
                self.set_synced(false);
                break;
            }
        }
    }

    fn send_control(&mut self, message: &ControlMessage) -> bool {
        self.send_frame(CONTROL_CHANNEL, &message.encode())
    }

    /// Encode and write one frame. The control channel is allowed while
    /// unsynced; every channel requires an exact DLC match. Succeeds only
    /// if the stream accepted the whole frame.
    fn send_frame(&mut self, channel: u8, payload: &[u8]) -> bool {
        let dlc = self.channel_dlc(channel);
        if dlc == 0 || payload.len() != usize::from(dlc) {
            return false;
        }
        if !self.synced && channel != CONTROL_CHANNEL {
            return false;
        }

        let mut wire = BytesMut::with_capacity(HEADER_LEN + payload.len());
        if encode_frame(channel, payload, &mut wire).is_err() {
            return false;
        }
        match self.stream.write(&wire) {
            Ok(written) => written == wire.len(),
            Err(err) => {
                debug!(channel, %err, "frame write failed");
                false
            }
        }
    }

    fn channel_dlc(&self, channel: u8) -> u8 {
        if channel == CONTROL_CHANNEL {
            CONTROL_CHANNEL_PAYLOAD_LENGTH as u8
        } else {
            self.tx_channels.dlc_of(channel)
        }
    }

    fn set_synced(&mut self, synced: bool) {
        if self.synced == synced {
            return;
        }
        self.synced = synced;
        if synced {
            debug!("session synced");
            if let Some(callback) = &mut self.on_synced {
                callback();
            }
        } else {
            debug!("session lost sync");
            if let Some(callback) = &mut self.on_desynced {
                callback();
            }
        }
    }
}
