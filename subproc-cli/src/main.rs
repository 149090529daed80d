//! CLI for inspecting and building subproc supervisor protocol messages.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod frames;
mod input;
mod request;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::prelude::*;

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "SUBPROC_LOG";

#[derive(Parser)]
#[command(
    name = "subproc",
    version,
    about = "Inspect and build subproc supervisor protocol messages"
)]
struct Cli {
    /// Log decoder diagnostics to stderr (overridden by SUBPROC_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a request message.
    Decode(input::InputArgs),

    /// Encode a request message and print it in hex.
    Encode {
        #[command(subcommand)]
        request: request::EncodeRequest,
    },

    /// Encode or decode a reply.
    Reply {
        #[command(subcommand)]
        action: frames::ReplyAction,
    },

    /// Decode a child lifecycle event.
    Event(input::InputArgs),

    /// List known signal names.
    Signals,

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for every subcommand.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text.
    #[default]
    Table,
    /// Machine-readable JSON.
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = cli.dispatch() {
        eprintln!("subproc: {e:#}");
        std::process::exit(1);
    }
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        let format = self.format;
        match self.command {
            Command::Decode(input) => request::decode(&input.read()?, format),
            Command::Encode { request } => request::encode(request, format),
            Command::Reply { action } => frames::reply(action, format),
            Command::Event(input) => frames::event(&input.read()?, format),
            Command::Signals => frames::signals(format),
            Command::Completion { shell } => {
                clap_complete::generate(
                    shell,
                    &mut Self::command(),
                    "subproc",
                    &mut std::io::stdout(),
                );
                Ok(())
            }
        }
    }
}

/// Installs a stderr subscriber filtered by `SUBPROC_LOG`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let format_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(format_layer)
        .init();
}
