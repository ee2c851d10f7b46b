use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bind a socket, run a session, and print subscribed payloads.
    Listen(ListenArgs),
    /// Connect and send one payload on a published channel.
    Send(SendArgs),
    /// Connect and report the session's sync state.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Publish a channel as NAME:DLC (repeatable).
    #[arg(long, value_name = "NAME:DLC")]
    pub publish: Vec<String>,
    /// Subscribe to a remote channel by name (repeatable).
    #[arg(long, value_name = "NAME")]
    pub subscribe: Vec<String>,
    /// Exit after receiving N payloads.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Channel name to publish and send on.
    #[arg(long, short = 'c')]
    pub channel: String,
    /// UTF-8 string payload.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
    /// Maximum time to wait for sync (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Maximum time to wait for sync (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

/// Milliseconds elapsed since `start`, as the session's u32 clock.
pub fn now_ms(start: Instant) -> u32 {
    start.elapsed().as_millis() as u32
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported timeout unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timeout_seconds() {
        assert_eq!(parse_timeout("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_timeout("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_timeout_millis() {
        assert_eq!(parse_timeout("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_timeout_invalid() {
        assert!(parse_timeout("0s").is_err());
        assert!(parse_timeout("bad").is_err());
        assert!(parse_timeout("").is_err());
    }
}
