mod delete;
mod projects;
mod sessions;
mod show;
mod sources;
mod util;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sessionhub_core::StoreRegistry;

#[derive(Parser)]
#[command(name = "sessionhub", about = "Browse AI coding assistant sessions across tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List session sources found on this machine
    Sources {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List projects across all sources
    Projects {
        /// Restrict to one source (e.g. claude, codex)
        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List sessions for a project (defaults to the current directory's
    /// project)
    Sessions {
        /// Project ID, path, or path suffix
        project: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Print a session transcript
    Show {
        /// Session ID, unique ID prefix, or transcript file path
        session: String,

        /// Scope the lookup to one project
        #[arg(long)]
        project: Option<String>,

        /// Load the whole transcript instead of a preview
        #[arg(long)]
        all: bool,
    },

    /// Delete a session transcript file
    Delete {
        /// Session ID, unique ID prefix, or transcript file path
        session: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let registry = Arc::new(discover_registry());

    let result = match cli.command {
        Commands::Sources { json } => sources::run(&registry, json),
        Commands::Projects { source, json } => projects::run(&registry, source.as_deref(), json),
        Commands::Sessions { project, json } => sessions::run(&registry, project.as_deref(), json),
        Commands::Show {
            session,
            project,
            all,
        } => show::run(&registry, &session, project.as_deref(), all),
        Commands::Delete { session, force } => delete::run(&registry, &session, force),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn discover_registry() -> StoreRegistry {
    sessionhub_sources::default_discovery().discover()
}
