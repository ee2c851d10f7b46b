use bytes::BufMut;

/// Maximum channel name length in bytes. Names are not required to be
/// null-terminated on the wire; shorter names are zero-padded.
pub const CHANNEL_NAME_MAX_LEN: usize = 10;

/// On-wire size of every control-channel payload: command (1) +
/// timestamp (4) + channel number (1) + channel name (10).
///
/// Both peers must agree on this size; control frames with any other DLC
/// fail to parse and are ignored.
pub const CONTROL_CHANNEL_PAYLOAD_LENGTH: usize = 16;

/// Heartbeat period while synced, in milliseconds.
pub const HEARTBEAT_PERIOD_SYNCED: u32 = 5000;
/// Heartbeat period while unsynced, in milliseconds.
pub const HEARTBEAT_PERIOD_UNSYNCED: u32 = 1000;

/// SYNC heartbeat challenge.
pub const CMD_SYNC: u8 = 0x00;
/// SYNC response, echoing the challenge timestamp.
pub const CMD_SYNC_RSP: u8 = 0x01;
/// Subscribe request carrying a channel name.
pub const CMD_SCRB: u8 = 0x02;
/// Subscribe response carrying the resolved channel number (0 = unknown).
pub const CMD_SCRB_RSP: u8 = 0x03;

/// A channel name in wire form: zero-padded to the maximum length.
pub type ChannelName = [u8; CHANNEL_NAME_MAX_LEN];

/// Pack a host-side name into wire form, truncating to the maximum
/// length and zero-padding the remainder.
pub fn pack_name(name: &str) -> ChannelName {
    let mut packed = [0u8; CHANNEL_NAME_MAX_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(CHANNEL_NAME_MAX_LEN);
    packed[..len].copy_from_slice(&bytes[..len]);
    packed
}

/// Render a wire-form name for diagnostics: lossy UTF-8, stopping at the
/// first padding byte.
pub fn display_name(name: &ChannelName) -> String {
    let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    String::from_utf8_lossy(&name[..end]).into_owned()
}

/// A message on the control channel.
///
/// The timestamp is meaningful for `Sync`/`SyncRsp` only, the channel
/// number for `ScrbRsp` only, the name for `Scrb`/`ScrbRsp` only; the
/// unused fields ride along as zero padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Heartbeat challenge with the sender's current clock.
    Sync { timestamp: u32 },
    /// Heartbeat echo carrying the challenge timestamp back.
    SyncRsp { timestamp: u32 },
    /// Subscribe to the named channel on the remote peer.
    Scrb { name: ChannelName },
    /// Answer to `Scrb`: the publish channel id, or 0 if unknown.
    ScrbRsp { channel: u8, name: ChannelName },
}

impl ControlMessage {
    /// Encode into the fixed control payload layout.
    pub fn encode(&self) -> [u8; CONTROL_CHANNEL_PAYLOAD_LENGTH] {
        let mut payload = [0u8; CONTROL_CHANNEL_PAYLOAD_LENGTH];
        match self {
            ControlMessage::Sync { timestamp } => {
                payload[0] = CMD_SYNC;
                (&mut payload[1..5]).put_u32(*timestamp);
            }
            ControlMessage::SyncRsp { timestamp } => {
                payload[0] = CMD_SYNC_RSP;
                (&mut payload[1..5]).put_u32(*timestamp);
            }
            ControlMessage::Scrb { name } => {
                payload[0] = CMD_SCRB;
                payload[6..].copy_from_slice(name);
            }
            ControlMessage::ScrbRsp { channel, name } => {
                payload[0] = CMD_SCRB_RSP;
                payload[5] = *channel;
                payload[6..].copy_from_slice(name);
            }
        }
        payload
    }

    /// Decode a control payload.
    ///
    /// Returns `None` for payloads of the wrong size or with an unknown
    /// command byte; the session ignores both.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() != CONTROL_CHANNEL_PAYLOAD_LENGTH {
            return None;
        }

        let timestamp = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
        let channel = payload[5];
        let mut name = [0u8; CHANNEL_NAME_MAX_LEN];
        name.copy_from_slice(&payload[6..]);

        match payload[0] {
            CMD_SYNC => Some(ControlMessage::Sync { timestamp }),
            CMD_SYNC_RSP => Some(ControlMessage::SyncRsp { timestamp }),
            CMD_SCRB => Some(ControlMessage::Scrb { name }),
            CMD_SCRB_RSP => Some(ControlMessage::ScrbRsp { channel, name }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_encodes_timestamp_big_endian() {
        let payload = ControlMessage::Sync { timestamp: 1000 }.encode();
        assert_eq!(payload[0], CMD_SYNC);
        assert_eq!(&payload[1..5], &[0x00, 0x00, 0x03, 0xE8]);
        assert!(payload[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn scrb_rsp_carries_channel_and_name() {
        let payload = ControlMessage::ScrbRsp {
            channel: 1,
            name: pack_name("TEST"),
        }
        .encode();
        assert_eq!(payload[0], CMD_SCRB_RSP);
        assert_eq!(payload[5], 1);
        assert_eq!(&payload[6..10], b"TEST");
        assert!(payload[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let messages = [
            ControlMessage::Sync { timestamp: 0 },
            ControlMessage::SyncRsp {
                timestamp: 0xDEAD_BEEF,
            },
            ControlMessage::Scrb {
                name: pack_name("SPEED"),
            },
            ControlMessage::ScrbRsp {
                channel: 7,
                name: pack_name("SPEED"),
            },
        ];
        for message in messages {
            let decoded = ControlMessage::decode(&message.encode());
            assert_eq!(decoded.as_ref(), Some(&message));
        }
    }

    #[test]
    fn unknown_command_is_ignored() {
        let mut payload = [0u8; CONTROL_CHANNEL_PAYLOAD_LENGTH];
        payload[0] = 0x7F;
        assert_eq!(ControlMessage::decode(&payload), None);
    }

    #[test]
    fn wrong_payload_size_is_ignored() {
        assert_eq!(ControlMessage::decode(&[CMD_SYNC; 11]), None);
        assert_eq!(ControlMessage::decode(&[CMD_SYNC; 17]), None);
    }

    #[test]
    fn pack_name_truncates_and_pads() {
        assert_eq!(&pack_name("LED")[..4], &[b'L', b'E', b'D', 0]);
        assert_eq!(pack_name("ABCDEFGHIJKLMN"), *b"ABCDEFGHIJ");
        assert_eq!(pack_name(""), [0u8; CHANNEL_NAME_MAX_LEN]);
    }

    #[test]
    fn display_name_stops_at_padding() {
        assert_eq!(display_name(&pack_name("LED")), "LED");
        assert_eq!(display_name(&pack_name("ABCDEFGHIJ")), "ABCDEFGHIJ");
    }
}
