use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Configuration;
use crate::database::TodoStore;
use crate::form::RawFields;
use crate::web::AppState;

mod config;
mod database;
mod form;
mod todo;
mod views;
mod web;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cmd {
    /// Configuration file to use instead of ~/.config/ticklist/ticklist.toml
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web interface.
    Serve {
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<String>,
    },
    Add {
        #[arg(short, long)]
        title: String,
        #[arg(short = 'D', long, default_value = "")]
        description: String,
        #[arg(short, long, value_name = "DATE")]
        date: Option<NaiveDate>,
        #[arg(short, long, value_name = "PRIORITY")]
        priority: Option<String>,
    },
    List {},
    /// Flip a todo between resolved and unresolved.
    Toggle { id: i64 },
    Delete { id: i64 },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticklist=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn serve(cfg: &Configuration, store: TodoStore, bind: Option<String>) -> Result<()> {
    let addr = bind.unwrap_or_else(|| cfg.server.bind.clone());
    let app = web::router(AppState {
        store,
        order: cfg.listing,
    });
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn add(
    store: &TodoStore,
    title: String,
    description: String,
    date: Option<NaiveDate>,
    priority: Option<String>,
) -> Result<()> {
    let raw = RawFields {
        title: Some(title),
        description: Some(description),
        due_date: date.map(|d| d.format("%Y-%m-%d").to_string()),
        priority,
        is_resolved: None,
    };
    let new = raw.validate_new().map_err(|errors| eyre!("{errors}"))?;
    let todo = store.create(new).await?;
    println!("Added todo {}.", todo.id);
    Ok(())
}

async fn list(cfg: &Configuration, store: &TodoStore) -> Result<()> {
    let today = Local::now().date_naive();
    let todos = store.list_all(&cfg.listing).await?;
    if todos.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }
    for todo in todos {
        let due = todo
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4} [{}] {:<6} {:<10}{} {}",
            todo.id,
            if todo.is_resolved { "x" } else { " " },
            todo.priority,
            due,
            if todo.is_overdue(today) { "!" } else { " " },
            todo.title,
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cmds = Cmd::parse();
    let cfg = match &cmds.config {
        Some(path) => Configuration::from_file(path)?,
        None => Configuration::load()?,
    };
    let store = TodoStore::open(&cfg.database.file).await?;

    match cmds.commands {
        Commands::Serve { bind } => serve(&cfg, store, bind).await,
        Commands::Add {
            title,
            description,
            date,
            priority,
        } => add(&store, title, description, date, priority).await,
        Commands::List {} => list(&cfg, &store).await,
        Commands::Toggle { id } => {
            let todo = store.toggle(id).await?;
            let state = if todo.is_resolved { "resolved" } else { "unresolved" };
            println!("Todo {id} is now {state}.");
            Ok(())
        }
        Commands::Delete { id } => {
            store.delete(id).await?;
            println!("Deleted todo {id}.");
            Ok(())
        }
    }
}
