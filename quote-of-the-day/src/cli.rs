use std::{net::Ipv4Addr, path::PathBuf, time::Duration};

use clap::{Parser, ValueHint, value_parser};

use crate::server::{DEFAULT_PORT, ServerConfig};

/// Serve RFC 865 Quote of the Day over TCP.
#[derive(Parser, Debug)]
#[command(name = "qotd", author, version, about, long_about = None)]
pub struct Cli {
    /// TCP port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, value_parser = value_parser!(u16).range(1..))]
    pub port: u16,

    /// IPv4 address to bind to.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub host: Ipv4Addr,

    /// Longest single wait for a client, in milliseconds. Shutdown is noticed
    /// within this interval.
    #[arg(long, default_value_t = 500, value_parser = value_parser!(u64).range(1..))]
    pub accept_timeout_ms: u64,

    /// How long to read and discard client input before replying, in
    /// milliseconds.
    #[arg(long, default_value_t = 250, value_parser = value_parser!(u64).range(1..))]
    pub drain_timeout_ms: u64,

    /// File with one quote per line. Blank lines are ignored.
    #[arg(value_name = "QUOTE_FILE", value_hint = ValueHint::FilePath)]
    pub quote_file: PathBuf,
}

impl Cli {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port.to_string(),
            quote_file: self.quote_file,
            accept_timeout: Duration::from_millis(self.accept_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }
}
