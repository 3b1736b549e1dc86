//! Tagspeak: tag-language to natural-language translation service.
//! Main library: config loading, pipeline wiring, HTTP server startup.

pub mod config;
pub mod metrics;
pub mod server;
pub mod translate;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config::{AppConfig, CacheBackendKind, CacheConfig, LogFormat};
use metrics::MetricsRegistry;
use server::AppState;
use translate::cache::{CacheBackend, TranslationCache};
use translate::deepseek::DeepSeekClient;
use translate::dictionary::Dictionary;
use translate::json_cache::JsonFileBackend;
use translate::sqlite_cache::SqliteBackend;
use translate::{TextGenerator, TranslationService};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tagspeak=info,tower_http=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Pick the durable store behind the translation cache.
/// An unopenable SQLite file degrades to an in-memory database.
fn cache_backend(config: &CacheConfig) -> Result<Box<dyn CacheBackend>> {
    match config.backend {
        CacheBackendKind::Json => Ok(Box::new(JsonFileBackend::new(&config.path))),
        CacheBackendKind::Sqlite => match SqliteBackend::open(&config.path) {
            Ok(backend) => Ok(Box::new(backend)),
            Err(e) => {
                warn!(error = %e, path = %config.path.display(), "SQLite cache unusable, cache will not persist");
                let backend = SqliteBackend::open_in_memory()
                    .context("failed to open in-memory SQLite cache")?;
                Ok(Box::new(backend))
            }
        },
    }
}

/// Load config, wire the pipeline, and serve until Ctrl-C.
pub async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    info!(
        host = %config.server.host,
        port = config.server.port,
        dictionary = %config.dictionary_path.display(),
        cache = %config.cache.path.display(),
        cache_backend = ?config.cache.backend,
        model = %config.generator.model,
        "tagspeak starting"
    );

    let dictionary = Arc::new(
        Dictionary::load_from_file(&config.dictionary_path).with_context(|| {
            format!(
                "failed to load dictionary from {}",
                config.dictionary_path.display()
            )
        })?,
    );

    let cache = TranslationCache::open(cache_backend(&config.cache)?);
    let metrics = Arc::new(MetricsRegistry::new());

    let generator: Option<Arc<dyn TextGenerator>> = match DeepSeekClient::new(&config.generator) {
        Ok(client) => {
            info!(base_url = %config.generator.base_url, "generation client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!(error = %e, "generation disabled, only cached translations will be served");
            None
        }
    };

    let service = Arc::new(TranslationService::new(
        dictionary,
        cache,
        generator,
        Arc::clone(&metrics),
    ));
    let state = Arc::new(AppState::new(service, metrics));
    let app = server::router(Arc::clone(&state));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    server::drain(&state).await;
    info!(entries = state.service.cache().len(), "cache flushed, shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
