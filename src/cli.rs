//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for Haptic Link.

use clap::{Parser, Subcommand};

/// Haptic Link - serialized control of a remote vibration device server
///
/// Keeps a single connection to a device server and funnels connect,
/// disconnect and intensity requests through one ordered queue.
#[derive(Parser, Debug)]
#[command(name = "haptic-link")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the connection manager against a simulated device server
    ///
    /// Reads console commands from stdin; type `help` for the list.
    Simulate {
        /// Path to configuration file
        #[arg(short, long, env = "HAPTIC_CONFIG")]
        config: Option<String>,

        /// Device server address (overrides server.url)
        #[arg(short, long)]
        server: Option<String>,

        /// Number of simulated devices (overrides simulator.devices)
        #[arg(long)]
        devices: Option<usize>,

        /// Simulated call latency in milliseconds (overrides simulator.latency_ms)
        #[arg(long)]
        latency_ms: Option<u64>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
