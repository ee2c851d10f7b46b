use std::time::{Duration, Instant};

use serde::Serialize;
use serialmux_frame::MAX_DATA_LEN;
use serialmux_peer::SerialMuxPeer;
use serialmux_stream::UnixDomainSocket;
use tracing::debug;

use crate::cmd::{now_ms, parse_timeout, SendArgs};
use crate::exit::{transport_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{to_hex, OutputFormat};

const TICK: Duration = Duration::from_millis(10);

#[derive(Serialize)]
struct SendOutput<'a> {
    channel: &'a str,
    size: usize,
    payload_hex: String,
    sent: bool,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_timeout(&args.timeout)?;
    let payload = resolve_payload(&args)?;

    let stream = UnixDomainSocket::connect(&args.path)
        .map_err(|err| transport_error("connect failed", err))?;
    let mut session: SerialMuxPeer<_, 10> = SerialMuxPeer::new(stream);

    if session.create_channel(&args.channel, payload.len() as u8) == 0 {
        return Err(CliError::new(
            USAGE,
            format!(
                "cannot create channel '{}' with dlc {}",
                args.channel,
                payload.len()
            ),
        ));
    }

    let start = Instant::now();
    while !session.is_synced() {
        if start.elapsed() >= timeout {
            return Err(CliError::new(
                TIMEOUT,
                format!("no sync with peer after {timeout:?}"),
            ));
        }
        session.process(now_ms(start));
        std::thread::sleep(TICK);
    }
    debug!(elapsed = ?start.elapsed(), "session synced");

    if !session.send_data_by_name(&args.channel, &payload) {
        return Err(CliError::new(FAILURE, "send refused by session"));
    }

    let out = SendOutput {
        channel: &args.channel,
        size: payload.len(),
        payload_hex: to_hex(&payload),
        sent: true,
    };
    print_result(&out, format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    let payload = match (&args.data, &args.hex) {
        (Some(data), None) => data.as_bytes().to_vec(),
        (None, Some(hex)) => parse_hex(hex)?,
        _ => {
            return Err(CliError::new(USAGE, "one of --data or --hex is required"));
        }
    };

    if payload.is_empty() || payload.len() > MAX_DATA_LEN {
        return Err(CliError::new(
            USAGE,
            format!(
                "payload must be 1..={MAX_DATA_LEN} bytes, got {}",
                payload.len()
            ),
        ));
    }
    Ok(payload)
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let input = input.trim();
    if input.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex payload must have even length"));
    }
    (0..input.len())
        .step_by(2)
        .map(|index| {
            u8::from_str_radix(&input[index..index + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}

fn print_result(out: &SendOutput<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "sent {} bytes on '{}' ({})",
                out.size, out.channel, out.payload_hex
            );
        }
        OutputFormat::Raw => {}
    }
}
