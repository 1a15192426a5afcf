use sprocket_api::{app, builtin_config, load_from_path, resolve, AppState, MemoryStore, PgStore, RecordStore, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sprocket_api=info,tower_http=info")),
        )
        .init();

    let config = match &settings.config_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading model config");
            load_from_path(path).await?
        }
        None => builtin_config()?,
    };
    let model = resolve(&config)?;

    let store: Arc<dyn RecordStore> = match &settings.database_url {
        Some(url) => {
            tracing::info!("using PostgreSQL store");
            Arc::new(PgStore::connect(url, settings.max_connections).await?)
        }
        None => {
            tracing::info!("DATABASE_URL not set; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let router = app(AppState::new(store, model), &settings);
    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
