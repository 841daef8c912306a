use std::{
    fs::read_to_string,
    net::{SocketAddr, ToSocketAddrs},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Deserialize;

use service::topology::PEERS_MAX;

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    pub fn as_level(&self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    /// log level
    ///
    /// The S2S send/recv lines are emitted at info; harnesses that grep
    /// them need at least that.
    #[serde(default = "Log::level")]
    pub level: Level,
}

impl Log {
    fn level() -> Level {
        Level::Info
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Self::level(),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Runtime {
    /// refresh interval, seconds
    ///
    /// The period of the S2S refresh tick. Routing entries start at
    /// freshness 2 and age once per tick, so soft state survives about
    /// two intervals without renewal.
    #[serde(default = "Runtime::refresh_interval")]
    pub refresh_interval: u64,

    /// user keepalive, seconds
    ///
    /// A client that sends nothing for this long is logged out by the
    /// reaper.
    #[serde(default = "Runtime::keepalive")]
    pub keepalive: u64,
}

impl Runtime {
    fn refresh_interval() -> u64 {
        60
    }

    fn keepalive() -> u64 {
        120
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            refresh_interval: Self::refresh_interval(),
            keepalive: Self::keepalive(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
struct File {
    #[serde(default)]
    runtime: Runtime,
    #[serde(default)]
    log: Log,
}

#[derive(Parser, Debug)]
#[command(version, about = "A federated datagram chat server.")]
struct Cli {
    /// JSON5 file with runtime tunables.
    #[arg(long)]
    config: Option<String>,

    /// Host to advertise and bind.
    host: String,

    /// Port to advertise and bind.
    port: u16,

    /// Peer servers, as alternating <host> <port> values.
    #[arg(num_args = 0..)]
    peers: Vec<String>,
}

#[derive(Debug)]
pub struct Config {
    pub listen: SocketAddr,
    pub peers: Vec<SocketAddr>,
    pub runtime: Runtime,
    pub log: Log,
}

impl Config {
    pub fn load() -> Result<Self> {
        let cli = Cli::parse();

        let file: File = match &cli.config {
            Some(path) => serde_json5::from_str(
                &read_to_string(path).with_context(|| format!("reading {}", path))?,
            )
            .with_context(|| format!("parsing {}", path))?,
            None => File::default(),
        };

        let listen = resolve(&cli.host, cli.port)?;

        if cli.peers.len() % 2 != 0 {
            bail!("peers must be given as <host> <port> pairs");
        }

        let mut peers = Vec::with_capacity(cli.peers.len() / 2);
        for pair in cli.peers.chunks(2) {
            let port: u16 = pair[1]
                .parse()
                .with_context(|| format!("bad peer port {:?}", pair[1]))?;
            peers.push(resolve(&pair[0], port)?);
        }

        if peers.len() > PEERS_MAX {
            bail!("at most {} peers are supported", PEERS_MAX);
        }

        Ok(Self {
            listen,
            peers,
            runtime: file.runtime,
            log: file.log,
        })
    }
}

/// Resolve a host once, at startup. The wire format carries a sockaddr_in
/// image, so only IPv4 will do.
fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolving {}:{}", host, port))?
        .find(|address| address.is_ipv4())
        .with_context(|| format!("no IPv4 address for {}:{}", host, port))
}
