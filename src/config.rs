//! The CLI surface (§4.8): a single `run-node` subcommand, plus the
//! resolved [`NodeConfig`] it produces once defaults (the local hostname)
//! have been applied.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chordnode",
    author,
    version,
    about = "A node in a Chord distributed hash table"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase logging verbosity; repeat for more detail
    /// (0 = warn, 1 = info, 2+ = debug).
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Where to send log output: `-` for stderr, any other value a file
    /// path opened in append mode.
    #[arg(long = "log-file", global = true, default_value = "-")]
    pub log_file: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    RunNode(RunNodeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunNodeArgs {
    /// Path to this node's local store.
    pub db_path: PathBuf,

    /// Address this node advertises to peers. Defaults to the local
    /// hostname.
    #[arg(short = 'n', long = "node-address")]
    pub node_address: Option<String>,

    /// Interface to listen on.
    #[arg(short = 'b', long = "bind-address", default_value = "localhost")]
    pub bind_address: String,

    /// Port to listen on, and the port advertised to peers.
    #[arg(short = 'p', long = "port", default_value_t = 8080)]
    pub port: u16,

    /// Bootstrap peer to join through; omit to start a new ring.
    #[arg(long = "remote-node")]
    pub remote_node: Option<String>,
}

/// Fully resolved configuration for running one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub db_path: PathBuf,
    pub node_address: String,
    pub bind_address: String,
    pub port: u16,
    pub remote_node: Option<String>,
}

impl NodeConfig {
    pub fn from_args(args: RunNodeArgs) -> Self {
        let node_address = args.node_address.unwrap_or_else(default_hostname);

        NodeConfig {
            db_path: args.db_path,
            node_address,
            bind_address: args.bind_address,
            port: args.port,
            remote_node: args.remote_node,
        }
    }

    /// Address to bind the listener on.
    pub fn bind_socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Address advertised to peers as this node's identity.
    pub fn advertised_addr(&self) -> String {
        format!("{}:{}", self.node_address, self.port)
    }
}

fn default_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Maps a `-v` repeat count onto a `log` verbosity level.
pub fn log_level_for(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}