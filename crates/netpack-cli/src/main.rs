//! Netpack CLI
//!
//! Bundles JavaScript modules that import straight from URLs, either once
//! from the command line or per request over HTTP.

mod commands;
mod output;
mod server;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use netpack_engine::Format;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "netpack")]
#[command(about = "URL-aware JavaScript bundler", long_about = None)]
#[command(version)]
struct Cli {
    /// When to use colored output (auto, always, never)
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve bundles over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },

    /// Bundle one entry module
    Build {
        /// Entry file, or `-` to read from stdin
        input: String,
        /// Write the bundle here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Minify whitespace and generated names
        #[arg(long)]
        minify: bool,
        /// Rewrite the entry only, keeping its imports
        #[arg(long)]
        no_bundle: bool,
        /// Output format (esm, iife)
        #[arg(long, default_value = "esm")]
        format: Format,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = Layer::new().with_writer(std::io::stderr);
    tracing_subscriber::registry().with(filter).with(layer).init();

    let cli = Cli::parse();
    let color = output::resolve_color_choice(cli.color.as_deref());

    let result = match cli.command {
        Commands::Serve { port } => commands::serve::execute(port),
        Commands::Build {
            input,
            output,
            minify,
            no_bundle,
            format,
        } => commands::build::execute(
            commands::build::BuildArgs {
                input,
                output,
                minify,
                bundle: !no_bundle,
                format,
            },
            color,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
