use std::{
    io,
    net::{SocketAddr, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use thiserror::Error;

/// Hard cap on upstream fanout endpoints.
pub const MAX_FANOUT: usize = 32;

/// Where the downstream ingester conventionally reads from.
pub const DEFAULT_PIPE: &str = "/tmp/noaaportIngesterPipe";

#[derive(Debug, Parser)]
#[command(
    name = "nbsblend",
    about = "Blend redundant NOAAPort fanout streams into one ordered stream"
)]
pub struct Cli {
    /// Log destination: `-` for stderr, otherwise a file appended to.
    #[arg(short = 'l', default_value = "-")]
    pub log_dest: String,

    /// Named pipe fed to the ingester; `-` writes to stdout instead.
    #[arg(short = 'p', default_value = DEFAULT_PIPE)]
    pub pipe: String,

    /// Frame latency in seconds: how long an out-of-order frame may wait
    /// for its predecessors before being emitted anyway.
    #[arg(short = 't', default_value_t = 1.0)]
    pub timeout_secs: f64,

    /// Informational logging.
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Debug logging.
    #[arg(short = 'x')]
    pub debug: bool,

    /// Upstream fanout servers, host:port.
    #[arg(required = true)]
    pub fanout: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot resolve fanout endpoint {0}: {1}")]
    Endpoint(String, #[source] io::Error),
    #[error("too many fanout endpoints ({0}), the limit is 32")]
    TooManyEndpoints(usize),
    #[error("frame latency must be a positive number of seconds, got {0}")]
    BadTimeout(f64),
}

/// Sink selected on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    Pipe(PathBuf),
    Stdout,
}

/// Resolved runtime configuration.
#[derive(Debug)]
pub struct Config {
    pub fanout: Vec<SocketAddr>,
    pub timeout: Duration,
    pub sink: SinkConfig,
}

impl Cli {
    /// Resolves endpoints and validates numbers. Any error here is a
    /// configuration error and worth exit code 1.
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            return Err(ConfigError::BadTimeout(self.timeout_secs));
        }
        if self.fanout.len() > MAX_FANOUT {
            return Err(ConfigError::TooManyEndpoints(self.fanout.len()));
        }

        let mut fanout = Vec::with_capacity(self.fanout.len());
        for endpoint in &self.fanout {
            let addr = endpoint
                .to_socket_addrs()
                .map_err(|err| ConfigError::Endpoint(endpoint.clone(), err))?
                .next()
                .ok_or_else(|| {
                    ConfigError::Endpoint(
                        endpoint.clone(),
                        io::Error::new(io::ErrorKind::NotFound, "resolved to no addresses"),
                    )
                })?;
            fanout.push(addr);
        }

        let sink = if self.pipe == "-" {
            SinkConfig::Stdout
        } else {
            SinkConfig::Pipe(PathBuf::from(&self.pipe))
        };

        Ok(Config { fanout, timeout: Duration::from_secs_f64(self.timeout_secs), sink })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("nbsblend").chain(args.iter().copied()))
    }

    #[test]
    fn resolves_numeric_endpoints() {
        let config = cli(&["-t", "0.5", "127.0.0.1:9001", "127.0.0.1:9002"]).resolve().unwrap();

        assert_eq!(config.fanout.len(), 2);
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.sink, SinkConfig::Pipe(PathBuf::from(DEFAULT_PIPE)));
    }

    #[test]
    fn dash_pipe_selects_stdout() {
        let config = cli(&["-p", "-", "127.0.0.1:9001"]).resolve().unwrap();

        assert_eq!(config.sink, SinkConfig::Stdout);
    }

    #[test]
    fn rejects_non_positive_timeout() {
        assert!(matches!(
            cli(&["-t", "0", "127.0.0.1:9001"]).resolve(),
            Err(ConfigError::BadTimeout(_))
        ));
    }

    #[test]
    fn rejects_unparsable_endpoint() {
        assert!(matches!(
            cli(&["no-port-here"]).resolve(),
            Err(ConfigError::Endpoint(endpoint, _)) if endpoint == "no-port-here"
        ));
    }

    #[test]
    fn rejects_too_many_endpoints() {
        let endpoints: Vec<String> =
            (0..=MAX_FANOUT).map(|i| format!("127.0.0.1:{}", 9000 + i)).collect();
        let mut args: Vec<&str> = Vec::new();
        for e in &endpoints {
            args.push(e);
        }

        assert!(matches!(
            cli(&args).resolve(),
            Err(ConfigError::TooManyEndpoints(n)) if n == MAX_FANOUT + 1
        ));
    }

    #[test]
    fn endpoints_are_required() {
        assert!(Cli::try_parse_from(["nbsblend"]).is_err());
    }
}
