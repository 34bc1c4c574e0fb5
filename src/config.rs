use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Mirror KOReader reading progress into Hardcover.
#[derive(Parser, Debug, Clone)]
#[command(name = "koreader-hardcover")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "KOHC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the local database (overrides the config file).
    #[arg(long, env = "KOHC_DATABASE", global = true)]
    pub db_path: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Import KOReader statistics and sync recent books to Hardcover.
    Sync {
        /// KOReader statistics.sqlite3 (defaults to `sync.statistics_path`).
        statistics: Option<PathBuf>,

        /// Number of most recently read books to sync.
        #[arg(long)]
        past: Option<usize>,

        /// Write to Hardcover even when it already matches.
        #[arg(long)]
        force: bool,

        /// Only import statistics, do not contact Hardcover.
        #[arg(long)]
        ingest_only: bool,

        /// Delete the local database before importing.
        #[arg(long)]
        reset_db: bool,
    },

    /// List imported books.
    Books {
        /// Filter by title or author.
        query: Option<String>,

        /// Maximum number of books to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Number of books to skip.
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },

    /// Map a local book to a Hardcover book.
    Map {
        /// Local book ID (MD5, see `books`).
        local_id: String,

        /// Hardcover book ID.
        book_id: i64,

        /// Hardcover edition ID.
        #[arg(short, long)]
        edition: Option<i64>,
    },

    /// Remove the Hardcover mapping of a local book.
    Unmap {
        /// Local book ID (MD5).
        local_id: String,
    },

    /// Create a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hardcover API configuration.
    #[serde(default)]
    pub hardcover: HardcoverConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Sync configuration.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Hardcover API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardcoverConfig {
    /// GraphQL endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API token. `HARDCOVER_BEARER_TOKEN` overrides it.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for HardcoverConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.hardcover.app/v1/graphql".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl HardcoverConfig {
    /// Whether a non-empty token is configured.
    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reading_stats.db")
}

/// Sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of most recently read books to sync.
    #[serde(default = "default_past")]
    pub past: usize,

    /// Default KOReader statistics.sqlite3 location.
    #[serde(default)]
    pub statistics_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            past: default_past(),
            statistics_path: None,
        }
    }
}

fn default_past() -> usize {
    2
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML.
    pub fn parse(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("HARDCOVER_BEARER_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.hardcover.token = Some(token);
        }
        if let Some(url) = var("HARDCOVER_API_URL").filter(|u| !u.trim().is_empty()) {
            self.hardcover.api_url = url;
        }
        if let Some(path) = var("KOREADER_DB_PATH").filter(|p| !p.trim().is_empty()) {
            self.sync.statistics_path = Some(PathBuf::from(path));
        }
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("koreader-hardcover.toml"),
            dirs::config_dir()
                .map(|p| p.join("koreader-hardcover").join("config.toml"))
                .unwrap_or_default(),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# koreader-hardcover configuration

[hardcover]
# api_url = "https://api.hardcover.app/v1/graphql"
# Token from https://hardcover.app/account/api (or set HARDCOVER_BEARER_TOKEN)
# token = "Bearer ..."
timeout_seconds = 30

[database]
path = "reading_stats.db"

[sync]
# Number of most recently read books to sync
past = 2
# statistics_path = "/mnt/onboard/.adds/koreader/settings/statistics.sqlite3"
"#
        .to_string()
    }
}
