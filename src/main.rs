//! Casebook CLI - migrations, data browsing and the HTTP API

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

#[derive(Parser)]
#[command(name = "casebook")]
#[command(version)]
#[command(about = "Case-management data service over SQLite")]
#[command(long_about = r#"
Casebook keeps advocates' encounters and notes with their clients:
  • Linear schema migrations with a configurable checkpoint
  • Paged, searchable listings of users, encounters and notes
  • A JSON HTTP API over the same services

Example usage:
  casebook init
  casebook migrate
  casebook encounters --advocate acf4adb2-1397-47a7-92ae-8336b22556e6
  casebook serve --port 3000
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file (default: casebook.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Bring the schema to the configured checkpoint
    Migrate {
        /// Last script to apply (overrides config)
        #[arg(long, conflicts_with = "nothing")]
        checkpoint: Option<String>,

        /// Roll every script back
        #[arg(long)]
        nothing: bool,
    },

    /// Show every migration script and whether it is applied
    Status,

    /// Serve the HTTP API
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List users
    Users {
        /// Keyword search on the name; quote phrases
        #[arg(short, long)]
        filter: Option<String>,

        /// Only clients of this advocate
        #[arg(long)]
        advocate: Option<String>,

        #[arg(long)]
        skip: Option<u64>,

        #[arg(long, default_value = "50")]
        take: u64,
    },

    /// List encounters, newest first
    Encounters {
        /// Keyword search on the summary
        #[arg(short, long)]
        filter: Option<String>,

        #[arg(long)]
        advocate: Option<String>,

        #[arg(long)]
        client: Option<String>,

        #[arg(long)]
        skip: Option<u64>,

        #[arg(long, default_value = "50")]
        take: u64,
    },

    /// List the notes of one encounter
    Notes {
        /// Encounter id
        #[arg(short, long)]
        encounter: String,

        /// Keyword search on the message
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print `{ "command": ..., "data": ... }` for JSON output
pub fn emit_success(command: &str, data: impl serde::Serialize) -> anyhow::Result<()> {
    let envelope = serde_json::json!({
        "command": command,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output = if cli.json { OutputMode::Json } else { OutputMode::Human };

    if let Commands::Init { force } = cli.command {
        let path = cli.config.unwrap_or_else(casebook::config::default_config_path);
        return commands::run_init(output, &path, force);
    }

    let mut config = casebook::config::load_config(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }

    let result = match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Migrate { checkpoint, nothing } => {
            if nothing {
                config.checkpoint = Some(String::new());
            } else if checkpoint.is_some() {
                config.checkpoint = checkpoint;
            }
            commands::run_migrate(output, &config)
        }
        Commands::Status => commands::run_status(output, &config),
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            commands::run_serve(&config)
        }
        Commands::Users { filter, advocate, skip, take } => {
            let params = casebook::services::UserListParams {
                skip,
                take: Some(take),
                filter_text: filter,
                advocate_id: advocate,
            };
            commands::run_users(output, &config, &params)
        }
        Commands::Encounters { filter, advocate, client, skip, take } => {
            let params = casebook::services::EncounterListParams {
                skip,
                take: Some(take),
                filter_text: filter,
                advocate_id: advocate,
                client_id: client,
            };
            commands::run_encounters(output, &config, &params)
        }
        Commands::Notes { encounter, filter } => {
            let params = casebook::services::EncounterNoteListParams {
                encounter_id: Some(encounter),
                filter_text: filter,
                ..Default::default()
            };
            commands::run_notes(output, &config, &params)
        }
    };

    if let Err(err) = &result {
        if output.is_human() {
            casebook::ui::error(&format!("{:#}", err));
            std::process::exit(1);
        }
    }
    result
}
