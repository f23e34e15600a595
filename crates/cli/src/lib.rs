use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(about = "Stockroom - inventory reservation service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the reservation service with the given configuration
    Start {
        /// Path to the configuration file
        #[arg(short, long, env = "STOCKROOM_CONFIG", default_value = "config/stockroom.yaml")]
        config: PathBuf,

        /// Override HTTP port
        #[arg(long)]
        http: Option<u16>,

        /// Override log format
        #[arg(long, value_enum)]
        log_format: Option<LogFormatArg>,
    },

    /// Validate configuration without starting the service
    Validate {
        /// Path to the configuration file
        #[arg(short, long, env = "STOCKROOM_CONFIG", default_value = "config/stockroom.yaml")]
        config: PathBuf,
    },

    /// Write a configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "stockroom.yaml")]
        output: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable output
    Pretty,

    /// One JSON object per line
    Json,

    /// Single-line events
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
