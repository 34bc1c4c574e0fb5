//! koreader-hardcover entry point.

use clap::Parser;
use koreader_hardcover::{
    config::{Cli, Command, Config},
    db::{BookMapping, BookSummary, Database, now_timestamp, timestamp_to_datetime},
    hardcover::HardcoverClient,
    sync::{OutcomeStatus, SyncService},
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "koreader_hardcover=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let mut config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };
    config.apply_env();
    if let Some(db_path) = cli.db_path {
        config.database.path = db_path;
    }

    match cli.command {
        Command::Init { force } => cmd_init(force),
        Command::Sync {
            statistics,
            past,
            force,
            ingest_only,
            reset_db,
        } => cmd_sync(&config, statistics, past, force, ingest_only, reset_db).await,
        Command::Books {
            query,
            limit,
            offset,
        } => cmd_books(&config, query.as_deref(), limit, offset),
        Command::Map {
            local_id,
            book_id,
            edition,
        } => cmd_map(&config, &local_id, book_id, edition),
        Command::Unmap { local_id } => cmd_unmap(&config, &local_id),
    }
}

/// Write a default config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());
    println!("\nSet your Hardcover token in config.toml or HARDCOVER_BEARER_TOKEN.");
    println!("Then run: koreader-hardcover sync /path/to/statistics.sqlite3");

    Ok(())
}

/// Import statistics, then sync recent books.
async fn cmd_sync(
    config: &Config,
    statistics: Option<PathBuf>,
    past: Option<usize>,
    force: bool,
    ingest_only: bool,
    reset_db: bool,
) -> anyhow::Result<()> {
    let db_path = &config.database.path;
    if reset_db && db_path.exists() {
        println!("Resetting database: {}", db_path.display());
        std::fs::remove_file(db_path)?;
    }

    let db = Database::open(db_path)?;

    let Some(statistics) = statistics.or_else(|| config.sync.statistics_path.clone()) else {
        anyhow::bail!(
            "No KOReader statistics database given. Pass a path or set sync.statistics_path."
        );
    };
    db.import_statistics(&statistics)?;

    if !ingest_only {
        if config.hardcover.has_token() {
            let past = past.unwrap_or(config.sync.past);
            println!("\nSyncing {} most recent books to Hardcover...", past);

            let client = HardcoverClient::new(&config.hardcover)?;
            let service = SyncService::new(&db, &client);

            for outcome in service.sync_progress(past, force).await? {
                match &outcome.status {
                    OutcomeStatus::UpToDate => {
                        println!("  \"{}\" is already up to date.", outcome.title)
                    }
                    OutcomeStatus::Updated(_) => {
                        println!("  Successfully synced \"{}\".", outcome.title)
                    }
                    OutcomeStatus::Failed(error) => {
                        println!("  Failed to sync \"{}\": {}", outcome.title, error)
                    }
                }
            }
        } else {
            tracing::warn!("HARDCOVER_BEARER_TOKEN not set. Skipping Hardcover sync.");
        }
    }

    let counts = db.counts()?;
    println!(
        "\nProcessed {} books ({} mapped) and {} sessions.",
        counts.books, counts.mapped, counts.sessions
    );

    Ok(())
}

/// List imported books.
fn cmd_books(
    config: &Config,
    query: Option<&str>,
    limit: usize,
    offset: usize,
) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let (books, total) = db.list_books(query, limit, offset)?;

    if books.is_empty() {
        println!("No books found.");
        return Ok(());
    }

    println!(
        "{:<32} {:<40} {:<16} {:<9} {:<9} MAPPED",
        "ID", "TITLE", "LAST READ", "STATUS", "SYNC"
    );
    println!("{}", "-".repeat(116));
    for book in &books {
        println!("{}", book_row(book));
    }
    println!(
        "\n{}-{} of {} books",
        offset + 1,
        offset + books.len(),
        total
    );

    Ok(())
}

/// Map a local book to Hardcover.
fn cmd_map(
    config: &Config,
    local_id: &str,
    book_id: i64,
    edition: Option<i64>,
) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    let Some(book) = db.get_book(local_id)? else {
        anyhow::bail!("Local book not found: {}", local_id);
    };

    let now = now_timestamp();
    let created_at = db
        .get_mapping(local_id)?
        .map(|m| m.created_at)
        .unwrap_or(now);

    db.save_mapping(&BookMapping {
        local_book_id: book.id.clone(),
        remote_book_id: book_id,
        remote_edition_id: edition,
        book_title: Some(book.title.clone()),
        author: book.authors.clone(),
        created_at,
        updated_at: now,
    })?;

    match edition {
        Some(edition) => println!(
            "Mapped \"{}\" to Hardcover book {} (edition {})",
            book.title, book_id, edition
        ),
        None => println!("Mapped \"{}\" to Hardcover book {}", book.title, book_id),
    }

    Ok(())
}

/// Remove a mapping.
fn cmd_unmap(config: &Config, local_id: &str) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    if db.delete_mapping(local_id)? {
        println!("Removed mapping for: {}", local_id);
    } else {
        println!("No mapping found for: {}", local_id);
    }

    Ok(())
}

/// One line of the `books` table.
fn book_row(book: &BookSummary) -> String {
    let last_read = book
        .last_open
        .map(|ts| timestamp_to_datetime(ts).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{:<32} {:<40} {:<16} {:<9} {:<9} {}",
        book.id,
        truncate(&book.title, 40),
        last_read,
        book.status,
        book.sync_status,
        if book.mapped { "yes" } else { "no" }
    )
}

/// Shorten a string to `max` characters for table output.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
