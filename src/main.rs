//! kwire - wire frame inspector
//!
//! Encodes sample requests to hex and decodes captured response frames to JSON.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::EncodeCommand;
use config::Config;
use kwire_protocol::Codec;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kwire")]
#[command(about = "Encode and decode v0 message-broker protocol frames")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "KWIRE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a request frame and print it as hex
    Encode {
        /// Correlation id (0 to 16777215)
        #[arg(long, global = true, default_value = "1")]
        correlation_id: i32,

        /// Api version (defaults to the configured version)
        #[arg(long, global = true)]
        api_version: Option<i16>,

        /// Client id (defaults to the configured client id)
        #[arg(long, global = true)]
        client_id: Option<String>,

        #[command(subcommand)]
        request: EncodeCommand,
    },

    /// Decode back-to-back response frames and print them as JSON
    Decode {
        /// Hex-encoded frames
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        hex: Option<String>,

        /// File holding raw frame bytes
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Inspect or write the configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as YAML
    Show,

    /// Write the effective configuration to a YAML file
    Init {
        /// Destination file
        #[arg(default_value = "kwire.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).map_err(|e| {
        eprintln!("{}: {}", "Config error".red(), e);
        e
    })?;
    if let Some(ref path) = cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }
    let codec = Codec::new(config.codec.clone());

    match cli.command {
        Commands::Encode {
            correlation_id,
            api_version,
            client_id,
            request,
        } => {
            let client_id = client_id.as_deref().unwrap_or(config.client_id());
            match commands::encode(&codec, &request, correlation_id, api_version, client_id) {
                Ok(frame) => println!("{}", frame),
                Err(e) => {
                    eprintln!("{}: {}", "Error".red(), e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Decode { hex, file } => {
            let input = match (hex, file) {
                (Some(hex), _) => commands::parse_hex(&hex)?,
                (None, Some(path)) => std::fs::read(&path)?.into(),
                (None, None) => return Err("one of --hex or --file is required".into()),
            };

            let report = commands::decode(&codec, input).map_err(|e| {
                eprintln!("{}: {}", "Decode failed".red(), e);
                e
            })?;
            for response in &report.responses {
                println!("{}", commands::format_json(response));
            }
            if report.incomplete_bytes > 0 {
                eprintln!(
                    "{}: trailing frame incomplete ({} bytes)",
                    "Warning".yellow(),
                    report.incomplete_bytes
                );
            }
        }
        Commands::Config { action } => match action {
            ConfigCommand::Show => print!("{}", serde_yaml::to_string(&config)?),
            ConfigCommand::Init { path, force } => {
                config.init(&path, force).map_err(|e| {
                    eprintln!("{}: {}", "Config error".red(), e);
                    e
                })?;
                println!("{} {}", "Wrote".green(), path.display());
            }
        },
    }

    Ok(())
}
