mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// voxnav -- drive a web page with spoken commands.
#[derive(Parser, Debug)]
#[command(name = "voxnav", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options that override configuration files and environment variables.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Extra config file, layered above ~/.voxnav and ./.voxnav
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Recognition language (BCP-47 tag)
    #[arg(long, global = true)]
    language: Option<String>,

    /// Pixels moved by "scroll up" / "scroll down"
    #[arg(long, global = true)]
    scroll_amount: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a transcript and print the command it maps to
    Parse {
        /// Transcript words
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        words: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print the command grammar and the recognition grammar hint
    Grammar,

    /// Run one transcript against a browser page
    Dispatch {
        /// Page WebSocket URL or DevTools HTTP endpoint
        #[arg(long, default_value = "http://localhost:9222")]
        cdp_url: String,

        /// Transcript words
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// Listen on the microphone and drive a browser page until Ctrl-C
    Listen {
        /// Page WebSocket URL or DevTools HTTP endpoint
        #[arg(long, default_value = "http://localhost:9222")]
        cdp_url: String,
    },

    /// Show the effective configuration and where each value came from
    Config,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays pipeable (RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { words, json } => commands::parse::run(&words.join(" "), json),
        Commands::Grammar => commands::grammar::run(&cli.global),
        Commands::Dispatch { cdp_url, words } => {
            commands::dispatch::run(&cli.global, &cdp_url, &words.join(" "))
        }
        Commands::Listen { cdp_url } => commands::listen::run(&cli.global, &cdp_url),
        Commands::Config => commands::config::show(&cli.global),
    }
}
