//! daytrace: activity tracking agent and daily timeline tools.
//!
//! ## Subcommands
//!
//! - `agent`: sample the focused window, segment it into sessions and upload them
//! - `ingest`: load a `{"events": [...]}` batch into the local store
//! - `report`: compressed timeline and per-project hours for one day
//! - `events`: stored events for one day with their ids, assigned or not
//! - `projects`, `assign`, `unassign`: project labels
//! - `config`: show or change the stored settings

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use daytrace::commands;
use daytrace::db::Database;
use daytrace::settings::{default_settings_path, SettingsStore};
use daytrace::utils::init_logging;
use daytrace::{log_debug, log_error};

const ENABLE_LOGS: bool = true;

#[derive(Parser)]
#[command(name = "daytrace")]
#[command(about = "Activity tracking agent and daily timeline tools")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to <data_dir>/daytrace/settings.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Local event store, overriding the configured one
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live segmenter and uploader until Ctrl-C
    Agent {
        /// JSON-lines sample feed; `-` or omitted reads stdin
        #[arg(long, value_name = "PATH")]
        feed: Option<String>,

        /// Write sessions to the local store instead of the server
        #[arg(long)]
        offline: bool,
    },

    /// Ingest a JSON event batch into the local store
    Ingest {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the compressed timeline for one day
    Report {
        /// User id (defaults to the configured one)
        #[arg(long)]
        user: Option<i64>,

        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List one day's stored events with their ids
    Events {
        /// User id (defaults to the configured one)
        #[arg(long)]
        user: Option<i64>,

        /// Day as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Manage project labels
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Assign a project to events
    Assign {
        #[arg(long)]
        user: i64,

        #[arg(long)]
        project: i64,

        #[arg(value_name = "EVENT_ID", required = true)]
        events: Vec<i64>,
    },

    /// Reset events to "Unassigned"
    Unassign {
        #[arg(long)]
        user: i64,

        #[arg(value_name = "EVENT_ID", required = true)]
        events: Vec<i64>,
    },

    /// Show or change stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the stored settings (environment overrides not applied)
    Show,
    /// Set one setting, e.g. `config set user_id 7`
    Set { key: String, value: String },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List projects by name
    List,
    /// Add a project (no-op if it exists)
    Add { name: String },
    /// Delete a project by id
    Delete { id: i64 },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        log_error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let store = SettingsStore::new(cli.config.unwrap_or_else(default_settings_path))?;
    let mut settings = store.effective();
    if let Some(path) = cli.database {
        settings.database_path = Some(path);
    }
    init_logging(cli.debug || settings.debug);
    log_debug!("Settings loaded from {}", store.path().display());

    match cli.command {
        Commands::Agent { feed, offline } => {
            commands::run_agent(settings, feed.as_deref(), offline).await
        }
        Commands::Ingest { file } => {
            let db = Database::new(settings.database_path())?;
            let report = commands::ingest_file(&db, &file).await?;
            println!(
                "{} inserted, {} duplicates, {} rejected",
                report.inserted, report.duplicates, report.rejected
            );
            Ok(())
        }
        Commands::Report { user, date, json } => {
            let db = Database::new(settings.database_path())?;
            let user_id = user.unwrap_or(settings.user_id);
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let report = commands::daily_report(&db, user_id, date).await?;
            commands::print_report(&report, json)
        }
        Commands::Events { user, date, json } => {
            let db = Database::new(settings.database_path())?;
            let user_id = user.unwrap_or(settings.user_id);
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let events = commands::day_events(&db, user_id, date).await?;
            commands::print_events(&events, json)
        }
        Commands::Projects { action } => {
            let db = Database::new(settings.database_path())?;
            match action {
                ProjectAction::List => commands::print_projects(&db.list_projects().await?),
                ProjectAction::Add { name } => {
                    let project = db.add_project(&name).await?;
                    println!("{:>5}  {}", project.id, project.name);
                }
                ProjectAction::Delete { id } => {
                    if db.delete_project(id).await? {
                        println!("Deleted project {id}");
                    } else {
                        println!("No project with id {id}");
                    }
                }
            }
            Ok(())
        }
        Commands::Assign {
            user,
            project,
            events,
        } => {
            let db = Database::new(settings.database_path())?;
            let name = db.resolve_project_name(Some(project)).await?;
            let updated = db.assign_project(events, project, user).await?;
            println!("Assigned {updated} events to {name}");
            Ok(())
        }
        Commands::Unassign { user, events } => {
            let db = Database::new(settings.database_path())?;
            let updated = db.unassign_project(events, user).await?;
            println!("Unassigned {updated} events");
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&store.stored())?);
                Ok(())
            }
            ConfigAction::Set { key, value } => {
                store.update(|stored| stored.set_field(&key, &value))?;
                println!("Saved {key} to {}", store.path().display());
                Ok(())
            }
        },
    }
}
