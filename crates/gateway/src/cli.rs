use clap::{Parser, Subcommand};

/// wikibench — an automated Wikipedia-navigation benchmark harness for LLMs.
#[derive(Debug, Parser)]
#[command(name = "wikibench", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve {
        /// Bind host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Bind port.
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Print version information.
    Version,
}
