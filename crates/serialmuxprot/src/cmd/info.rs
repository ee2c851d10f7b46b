use std::time::{Duration, Instant};

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialmux_peer::SerialMuxPeer;
use serialmux_stream::UnixDomainSocket;

use crate::cmd::{now_ms, parse_timeout, InfoArgs};
use crate::exit::{transport_error, CliResult, FAILURE, SUCCESS};
use crate::output::OutputFormat;

const TICK: Duration = Duration::from_millis(10);

#[derive(Serialize)]
struct InfoOutput {
    path: String,
    synced: bool,
    sync_elapsed_ms: Option<u128>,
    tx_channels: u8,
    rx_channels: u8,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;

    let stream = UnixDomainSocket::connect(&args.path)
        .map_err(|err| transport_error("connect failed", err))?;
    let mut session: SerialMuxPeer<_, 10> = SerialMuxPeer::new(stream);

    let start = Instant::now();
    let mut sync_elapsed_ms = None;
    while start.elapsed() < timeout {
        session.process(now_ms(start));
        if session.is_synced() {
            sync_elapsed_ms = Some(start.elapsed().as_millis());
            break;
        }
        std::thread::sleep(TICK);
    }

    let out = InfoOutput {
        path: args.path.display().to_string(),
        synced: session.is_synced(),
        sync_elapsed_ms,
        tx_channels: session.num_tx_channels(),
        rx_channels: session.num_rx_channels(),
    };
    print_info(&out, format);

    Ok(if out.synced { SUCCESS } else { FAILURE })
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PATH", "SYNCED", "SYNC MS", "TX", "RX"])
                .add_row(vec![
                    out.path.clone(),
                    out.synced.to_string(),
                    out.sync_elapsed_ms
                        .map(|ms| ms.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    out.tx_channels.to_string(),
                    out.rx_channels.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Session Info:");
            println!("  Path:     {}", out.path);
            println!("  Synced:   {}", out.synced);
            match out.sync_elapsed_ms {
                Some(ms) => println!("  Sync in:  {ms}ms"),
                None => println!("  Sync in:  never"),
            }
            println!("  TX chans: {}", out.tx_channels);
            println!("  RX chans: {}", out.rx_channels);
        }
        OutputFormat::Raw => {
            println!("{}", out.synced);
        }
    }
}
