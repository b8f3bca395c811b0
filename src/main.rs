use anyhow::{Context, Result};
use docbin::{
    app,
    catalog::{Catalog, SqliteCatalog, run_migrations},
    config::AppConfig,
    queue::{MemoryWorkQueue, RedisWorkQueue, WorkQueue},
    search::{ElasticsearchIndex, MemorySearchIndex, SearchIndex},
    state::{AppState, StateSettings},
    storage::{LocalObjectStore, ObjectStore},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting docbin with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let connect_options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parsing database URL `{}`", db_url))?
        .create_if_missing(true)
        .foreign_keys(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .context("connecting to the database")?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Backends ---
    let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(db.clone()));

    let local = LocalObjectStore::new(&cfg.storage_dir, &cfg.bucket);
    local
        .ensure_root()
        .await
        .with_context(|| format!("preparing storage directory {}", cfg.storage_dir))?;
    let store: Arc<dyn ObjectStore> = Arc::new(local);

    let queue: Arc<dyn WorkQueue> = match &cfg.redis_url {
        Some(url) => Arc::new(RedisWorkQueue::connect(url).await?),
        None => {
            tracing::warn!("No Redis URL configured; extraction jobs stay in process");
            Arc::new(MemoryWorkQueue::new())
        }
    };

    let index: Arc<dyn SearchIndex> = match &cfg.search_url {
        Some(url) => {
            let url = url
                .parse()
                .with_context(|| format!("parsing search URL `{}`", url))?;
            Arc::new(ElasticsearchIndex::new(url, cfg.search_index.clone())?)
        }
        None => {
            tracing::warn!("No search URL configured; using an empty in-memory index");
            Arc::new(MemorySearchIndex::new())
        }
    };

    let state = AppState::new(
        catalog,
        store,
        queue,
        index,
        StateSettings {
            jwt_secret: cfg.jwt_secret.clone(),
            extraction_queue: cfg.extraction_queue.clone(),
            bucket: cfg.bucket.clone(),
        },
    );

    // --- Build router ---
    let app = app(state, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
