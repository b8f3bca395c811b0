use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, str::FromStr};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub bucket: String,
    pub database_url: String,
    pub jwt_secret: String,
    /// No URL means an in-process queue.
    pub redis_url: Option<String>,
    pub extraction_queue: String,
    /// No URL means an in-process index.
    pub search_url: Option<String>,
    pub search_index: String,
    pub max_upload_bytes: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("bucket", &self.bucket)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"****")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "****"))
            .field("extraction_queue", &self.extraction_queue)
            .field("search_url", &self.search_url)
            .field("search_index", &self.search_index)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Document bins API")]
pub struct Args {
    /// Host to bind to (overrides DOCBIN_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DOCBIN_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where document content is stored (overrides DOCBIN_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Bucket name under the storage directory (overrides DOCBIN_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Database URL (overrides DOCBIN_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// HS256 secret used to verify bearer tokens (overrides DOCBIN_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Redis URL for the extraction queue (overrides DOCBIN_REDIS_URL)
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Queue name for extraction jobs (overrides DOCBIN_EXTRACTION_QUEUE)
    #[arg(long)]
    pub extraction_queue: Option<String>,

    /// Elasticsearch base URL (overrides DOCBIN_SEARCH_URL)
    #[arg(long)]
    pub search_url: Option<String>,

    /// Search index name (overrides DOCBIN_SEARCH_INDEX)
    #[arg(long)]
    pub search_index: Option<String>,

    /// Maximum request body size in bytes (overrides DOCBIN_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.into())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        Self::merge(args)
    }

    fn merge(args: Args) -> Result<(Self, bool)> {
        // --- Environment fallback ---
        let env_port = env_parsed("DOCBIN_PORT", 8080u16)?;
        let env_max_upload = env_parsed("DOCBIN_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let jwt_secret = match args.jwt_secret.or_else(|| env_opt("DOCBIN_JWT_SECRET")) {
            Some(secret) => secret,
            None if args.migrate => String::new(),
            None => bail!("DOCBIN_JWT_SECRET (or --jwt-secret) is required"),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or_else(|| env_or("DOCBIN_HOST", "0.0.0.0")),
            port: args.port.unwrap_or(env_port),
            storage_dir: args
                .storage_dir
                .unwrap_or_else(|| env_or("DOCBIN_STORAGE_DIR", "./data/objects")),
            bucket: args.bucket.unwrap_or_else(|| env_or("DOCBIN_BUCKET", "docbin")),
            database_url: args
                .database_url
                .unwrap_or_else(|| env_or("DOCBIN_DATABASE_URL", "sqlite://./data/meta/docbin.db")),
            jwt_secret,
            redis_url: args.redis_url.or_else(|| env_opt("DOCBIN_REDIS_URL")),
            extraction_queue: args
                .extraction_queue
                .unwrap_or_else(|| env_or("DOCBIN_EXTRACTION_QUEUE", "extraction_queue")),
            search_url: args.search_url.or_else(|| env_opt("DOCBIN_SEARCH_URL")),
            search_index: args
                .search_index
                .unwrap_or_else(|| env_or("DOCBIN_SEARCH_INDEX", "documents")),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
