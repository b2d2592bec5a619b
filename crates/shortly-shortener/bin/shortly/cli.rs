use clap::{Parser, Subcommand, ValueEnum};
use shortly_core::OwnerId;
use shortly_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const STORAGE_BACKEND_ENV: &str = "SHORTLY_STORAGE";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const INMEM_FLUSH_INTERVAL_ENV: &str = "SHORTLY_INMEM_FLUSH_INTERVAL_MS";
pub const DELETE_FLUSH_INTERVAL_ENV: &str = "SHORTLY_DELETE_FLUSH_INTERVAL_MS";
pub const OWNER_ENV: &str = "SHORTLY_OWNER_ID";
pub const LOG_FORMAT_ENV: &str = "SHORTLY_LOG_FORMAT";

pub const DEFAULT_FILE_STORAGE_PATH: &str = "localhost.db";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_INMEM_FLUSH_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_DELETE_FLUSH_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shortly", about = "Shorten, resolve and delete URLs")]
pub struct Cli {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    /// Snapshot file of the in-memory backend.
    #[arg(long, env = FILE_STORAGE_PATH_ENV, default_value = DEFAULT_FILE_STORAGE_PATH)]
    pub file_storage_path: PathBuf,

    /// PostgreSQL DSN. Setting it selects the postgres backend.
    #[arg(long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Prefix of the rendered short URLs.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = INMEM_FLUSH_INTERVAL_ENV,
        default_value_t = DEFAULT_INMEM_FLUSH_INTERVAL_MS
    )]
    pub inmem_flush_interval_ms: u64,

    #[arg(
        long,
        env = DELETE_FLUSH_INTERVAL_ENV,
        default_value_t = DEFAULT_DELETE_FLUSH_INTERVAL_MS
    )]
    pub delete_flush_interval_ms: u64,

    /// Owner the command acts for. A new one is minted when absent.
    #[arg(long, env = OWNER_ENV)]
    pub owner: Option<OwnerId>,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// A DSN wins over `--storage`.
    pub fn backend(&self) -> StorageBackendArg {
        if self.database_dsn.is_some() {
            StorageBackendArg::Postgres
        } else {
            self.storage
        }
    }

    pub fn inmem_flush_interval(&self) -> Duration {
        Duration::from_millis(self.inmem_flush_interval_ms)
    }

    pub fn delete_flush_interval(&self) -> Duration {
        Duration::from_millis(self.delete_flush_interval_ms)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one URL.
    Shorten { url: String },
    /// Shorten several URLs at once, given as CORRELATION_ID=URL.
    BatchShorten {
        #[arg(required = true, value_parser = parse_batch_item)]
        items: Vec<(String, String)>,
    },
    /// Print the URL behind a key.
    Decode { key: String },
    /// List the live URLs of the owner.
    List,
    /// Delete keys of the owner.
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print the number of live URLs and of their owners.
    Stats,
    /// Check that the storage backend is reachable.
    Ping,
}

fn parse_batch_item(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((id, url)) if !id.is_empty() && !url.is_empty() => {
            Ok((id.to_string(), url.to_string()))
        }
        _ => Err(format!("expected CORRELATION_ID=URL, got '{raw}'")),
    }
}
