//! Command line surface: `restore`, `nodes trace`, `messages parse`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "lntopo", about = "Replay Lightning Network gossip into historical channel graph snapshots")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a gossip dataset into a topology snapshot at a given time.
    Restore {
        /// Path to a `GSP1` dataset, optionally `.bz2`-compressed.
        dataset: PathBuf,
        /// Unix timestamp to restore to. Defaults to now.
        timestamp: Option<u32>,
        #[arg(long = "fmt", default_value = "dot")]
        fmt: String,
        #[arg(long = "fix-missing")]
        fix_missing: Option<String>,
    },
    /// Node-scoped operations.
    Nodes {
        #[command(subcommand)]
        command: NodesCommand,
    },
    /// Message-scoped operations.
    Messages {
        #[command(subcommand)]
        command: MessagesCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum NodesCommand {
    /// Filter a `gossip_store` down to the records that touch one node.
    Trace {
        /// The node id, as 66 hex characters.
        node_id: String,
        /// Path to a `gossip_store` file.
        gossip_store: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum MessagesCommand {
    /// Decode a single gossip message given as hex and print it as JSON.
    Parse {
        /// The message bytes, including the 2-byte type header, as hex.
        hex: String,
    },
}
