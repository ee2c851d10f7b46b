mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "serialmuxprot", version, about = "SerialMuxProt session CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "serialmuxprot",
            "send",
            "/tmp/test.sock",
            "--channel",
            "SPEED",
            "--data",
            "head",
        ])
        .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "serialmuxprot",
            "send",
            "/tmp/test.sock",
            "--channel",
            "SPEED",
            "--data",
            "head",
            "--hex",
            "12345678",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_listen_subcommand_with_channels() {
        let cli = Cli::try_parse_from([
            "serialmuxprot",
            "listen",
            "/tmp/test.sock",
            "--publish",
            "STATUS:2",
            "--subscribe",
            "SPEED",
            "--subscribe",
            "LED",
        ])
        .expect("listen args should parse");

        match cli.command {
            Command::Listen(args) => {
                assert_eq!(args.publish, vec!["STATUS:2"]);
                assert_eq!(args.subscribe, vec!["SPEED", "LED"]);
            }
            other => panic!("expected listen, got {other:?}"),
        }
    }

    #[test]
    fn parses_info_subcommand() {
        let cli =
            Cli::try_parse_from(["serialmuxprot", "info", "/tmp/test.sock", "--timeout", "3s"])
                .expect("info args should parse");
        assert!(matches!(cli.command, Command::Info(_)));
    }
}
