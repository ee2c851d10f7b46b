use serde::Serialize;
use serialmux_frame::{MAX_DATA_LEN, MAX_FRAME_LEN};
use serialmux_peer::{
    CHANNEL_NAME_MAX_LEN, CONTROL_CHANNEL_PAYLOAD_LENGTH, HEARTBEAT_PERIOD_SYNCED,
    HEARTBEAT_PERIOD_UNSYNCED,
};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    protocol: Option<ProtocolInfo>,
}

#[derive(Serialize)]
struct ProtocolInfo {
    max_data_len: usize,
    max_frame_len: usize,
    channel_name_max_len: usize,
    control_payload_len: usize,
    heartbeat_synced_ms: u32,
    heartbeat_unsynced_ms: u32,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = VersionOutput {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        protocol: args.extended.then_some(ProtocolInfo {
            max_data_len: MAX_DATA_LEN,
            max_frame_len: MAX_FRAME_LEN,
            channel_name_max_len: CHANNEL_NAME_MAX_LEN,
            control_payload_len: CONTROL_CHANNEL_PAYLOAD_LENGTH,
            heartbeat_synced_ms: HEARTBEAT_PERIOD_SYNCED,
            heartbeat_unsynced_ms: HEARTBEAT_PERIOD_UNSYNCED,
        }),
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        _ => {
            println!("{} {}", out.name, out.version);
            if let Some(protocol) = &out.protocol {
                println!(
                    "frame: dlc 1..={}, {} bytes max",
                    protocol.max_data_len, protocol.max_frame_len
                );
                println!(
                    "control: {} byte payload, names up to {} bytes",
                    protocol.control_payload_len, protocol.channel_name_max_len
                );
                println!(
                    "heartbeat: {}ms synced, {}ms unsynced",
                    protocol.heartbeat_synced_ms, protocol.heartbeat_unsynced_ms
                );
            }
        }
    }

    Ok(SUCCESS)
}
