//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Supervise the Kafka UI service: lifecycle, files, commands and readiness
#[derive(Parser, Debug)]
#[command(name = "kafka-ui-workload")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Config file layered over the global one
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Container root directory (overrides `container_root`)
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply the service layer and restart the service
    Start,

    /// Stop the service
    Stop,

    /// Re-apply the service layer and restart the service
    Restart,

    /// Readiness probe (exit code 1 when not active)
    Status,

    /// Check whether the container can be reached
    Installed,

    /// Print the service layer as YAML
    Layer,

    /// Print a file from the container
    Read {
        /// Container path
        path: PathBuf,
    },

    /// Write content to a file in the container
    Write {
        /// Container path
        path: PathBuf,
        /// Content, or `-` to read stdin
        content: String,
        /// Append instead of overwriting
        #[arg(short, long)]
        append: bool,
    },

    /// Run a command in the container
    Exec {
        /// Environment entry (repeatable)
        #[arg(short, long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,
        /// Working directory
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Command and arguments
        #[arg(last = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Merge KEY=VALUE entries into the environment file
    #[command(name = "set-env")]
    SetEnv {
        /// Entries to merge
        #[arg(required = true, value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },

    /// Check whether host:port accepts TCP connections
    #[command(name = "check-socket")]
    CheckSocket {
        host: String,
        port: u16,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a commented config template
    Template,

    /// Show config paths
    Path,
}
