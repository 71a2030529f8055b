//! HTTP API server entry point

use std::sync::Arc;

use ripple::api::routes::build_router;
use ripple::api::ApiState;
use ripple::auth::RevocationStore;
use ripple::bus::{KafkaPublisher, Publisher};
use ripple::config::AppConfig;
use ripple::service::groups::RecentCreates;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(AppConfig::load()?);
    tracing::info!(addr = %config.api_server.bind_addr(), "starting api server");

    let pool = ripple::repo::connect(&config.database).await?;
    tracing::info!("database connected");

    let revocation = RevocationStore::connect(&config.session_revocation).await?;
    tracing::info!("revocation store connected");

    let kafka = Arc::new(KafkaPublisher::new(&config.log)?);
    let publisher: Arc<dyn Publisher> = kafka.clone();
    tracing::info!(brokers = %config.log.broker_list(), "log producer ready");

    let blob_store: Arc<dyn ripple::storage::BlobStore> =
        Arc::from(ripple::storage::from_config(&config.storage).await?);
    tracing::info!(backend = %config.storage.storage_type, "blob store ready");

    let state = ApiState {
        pool,
        config: config.clone(),
        publisher,
        revocation,
        blob_store,
        recent_creates: Arc::new(RecentCreates::default()),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.api_server.bind_addr()).await?;
    tracing::info!("api server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    kafka.flush();
    tracing::info!("api server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
