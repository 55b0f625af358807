use crate::server::streaming::session::ExhaustionPolicy;
use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;

/// Runtime configuration for the `streamer-server` binary.
///
/// Values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first). `PORT` has no default: a missing or malformed port
/// aborts startup.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "streamer-server",
    version,
    about = "A gRPC service that pushes paced event streams to subscribers"
)]
pub struct CliArgs {
    /// Host or IP address to listen on.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// TCP port to listen on.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT")]
    pub port: u16,

    /// Delay between two consecutive events of a subscription, in
    /// milliseconds. The first event is sent one interval after subscribing.
    ///
    /// Environment variable: `STREAM_INTERVAL_MS`
    #[arg(long, env = "STREAM_INTERVAL_MS", default_value_t = 2000)]
    pub interval_ms: u64,

    /// Close the stream right after the last event instead of waiting one
    /// more interval.
    ///
    /// Environment variable: `STREAM_EAGER_CLOSE`
    #[arg(long, env = "STREAM_EAGER_CLOSE", default_value_t = false)]
    pub eager_close: bool,

    /// JSON file holding the events to stream, as an array of
    /// `{"event_id", "type", "payload"}` objects. Defaults to the built-in
    /// demo catalog.
    ///
    /// Environment variable: `EVENTS_FILE`
    #[arg(long, env = "EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Capacity of the channel between a session and its gRPC response
    /// stream.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 1)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight streams to finish on shutdown before
    /// they are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub interval: Duration,
    pub exhaustion: ExhaustionPolicy,
    pub events_file: Option<PathBuf>,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.interval_ms == 0 {
            bail!("STREAM_INTERVAL_MS must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        let exhaustion = if args.eager_close {
            ExhaustionPolicy::Immediate
        } else {
            ExhaustionPolicy::Paced
        };

        Ok(Self {
            server_addr: format!("{}:{}", args.host, args.port),
            interval: Duration::from_millis(args.interval_ms),
            exhaustion,
            events_file: args.events_file,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(
            ["streamer-server", "--port", "50051"]
                .iter()
                .chain(extra.iter())
                .copied(),
        )?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn builds_listen_address_from_host_and_port() -> anyhow::Result<()> {
        let config = parse(&["--host", "127.0.0.1", "--interval-ms", "250"])?;
        assert_eq!(config.server_addr, "127.0.0.1:50051");
        assert_eq!(config.interval, Duration::from_millis(250));
        Ok(())
    }

    #[test]
    fn eager_close_selects_immediate_exhaustion() -> anyhow::Result<()> {
        let config = parse(&["--eager-close"])?;
        assert_eq!(config.exhaustion, ExhaustionPolicy::Immediate);
        Ok(())
    }

    #[test]
    fn rejects_zero_interval() {
        let err = parse(&["--interval-ms", "0"]).unwrap_err();
        assert!(err.to_string().contains("STREAM_INTERVAL_MS"));
    }

    #[test]
    fn rejects_zero_buffer() {
        assert!(parse(&["--stream-buffer-size", "0"]).is_err());
    }

    #[test]
    fn rejects_malformed_port() {
        assert!(CliArgs::try_parse_from(["streamer-server", "--port", "not-a-port"]).is_err());
        assert!(CliArgs::try_parse_from(["streamer-server", "--port", "70000"]).is_err());
    }
}
