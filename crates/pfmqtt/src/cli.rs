//! Clap derive structures for the `pfmqtt` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// pfmqtt -- pfSense firewall rules as MQTT switches
#[derive(Debug, Parser)]
#[command(
    name = "pfmqtt",
    version,
    about = "Expose pfSense firewall rules as Home Assistant switches over MQTT",
    long_about = "Bridges a pfSense firewall (via the FauxAPI package) to an MQTT broker.\n\n\
        Every configured rule is announced through Home Assistant MQTT discovery\n\
        as a switch; toggling the switch enables or disables the rule.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the configuration file
    #[arg(long, short = 'c', env = "PFMQTT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge until interrupted
    Run,

    /// Print each managed rule's identifier and state as JSON, then exit
    Status,
}
