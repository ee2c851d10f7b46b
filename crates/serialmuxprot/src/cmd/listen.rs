use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serialmux_peer::SerialMuxPeer;
use serialmux_stream::UnixDomainSocket;
use tracing::info;

use crate::cmd::{now_ms, ListenArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_payload, OutputFormat};

const SESSION_CHANNELS: usize = 10;
const TICK: Duration = Duration::from_millis(10);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let publishes = parse_publish_specs(&args.publish)?;

    let socket =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(path = ?args.path, "waiting for peer");
    let stream = socket
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;

    let mut session: SerialMuxPeer<_, SESSION_CHANNELS> = SerialMuxPeer::new(stream);
    session.on_synced(|| info!("session synced"));
    session.on_desynced(|| info!("session lost sync"));

    for (name, dlc) in &publishes {
        if session.create_channel(name, *dlc) == 0 {
            return Err(CliError::new(
                USAGE,
                format!("cannot create channel '{name}' with dlc {dlc}"),
            ));
        }
    }

    let received = Arc::new(AtomicUsize::new(0));
    for name in &args.subscribe {
        let label = name.clone();
        let counter = Arc::clone(&received);
        let queued = session.subscribe_to_channel(name, move |payload| {
            print_payload(&label, payload, format);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        if !queued {
            return Err(CliError::new(
                USAGE,
                format!("too many subscriptions (max {SESSION_CHANNELS})"),
            ));
        }
    }

    let start = Instant::now();
    while running.load(Ordering::SeqCst) {
        session.process(now_ms(start));
        if let Some(count) = args.count {
            if received.load(Ordering::SeqCst) >= count {
                break;
            }
        }
        std::thread::sleep(TICK);
    }

    Ok(SUCCESS)
}

fn parse_publish_specs(specs: &[String]) -> CliResult<Vec<(String, u8)>> {
    specs
        .iter()
        .map(|spec| {
            let (name, dlc) = spec.split_once(':').ok_or_else(|| {
                CliError::new(
                    USAGE,
                    format!("invalid publish spec '{spec}' (expected NAME:DLC)"),
                )
            })?;
            let dlc: u8 = dlc.parse().map_err(|_| {
                CliError::new(USAGE, format!("invalid DLC in publish spec '{spec}'"))
            })?;
            Ok((name.to_string(), dlc))
        })
        .collect()
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_specs_parse_name_and_dlc() {
        let parsed = parse_publish_specs(&["SPEED:4".to_string(), "LED:1".to_string()]).unwrap();
        assert_eq!(
            parsed,
            vec![("SPEED".to_string(), 4), ("LED".to_string(), 1)]
        );
    }

    #[test]
    fn publish_specs_reject_malformed_input() {
        assert!(parse_publish_specs(&["SPEED".to_string()]).is_err());
        assert!(parse_publish_specs(&["SPEED:abc".to_string()]).is_err());
        assert!(parse_publish_specs(&["SPEED:300".to_string()]).is_err());
    }
}
