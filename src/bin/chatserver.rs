//! Chat gateway entry point
//!
//! Runs the hub, the WebSocket listener, and the three log consumers: the
//! message pipeline (inbound topic), the fan-out consumer (outbound topic),
//! and the friend-request consumer. All loops stop on SIGINT/SIGTERM; the
//! producer flushes with a bounded timeout before exit.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::watch;

use ripple::auth::RevocationStore;
use ripple::bus::{Consumer, KafkaPublisher, Publisher};
use ripple::config::AppConfig;
use ripple::gateway::ws::ws_handler;
use ripple::gateway::{GatewayState, Hub};
use ripple::service::messages::{InboundSubmitter, MessagePipeline};
use ripple::wire::OutboundEnvelope;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(addr = %config.server.bind_addr(), "starting chat gateway");

    let pool = ripple::repo::connect(&config.database).await?;
    tracing::info!("database connected");

    let revocation = RevocationStore::connect(&config.session_revocation).await?;
    tracing::info!("revocation store connected");

    let kafka = Arc::new(KafkaPublisher::new(&config.log)?);
    let publisher: Arc<dyn Publisher> = kafka.clone();
    tracing::info!(brokers = %config.log.broker_list(), "log producer ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Hub: single-writer over the user -> socket map.
    let (hub, hub_handle) = Hub::new();
    tokio::spawn(hub.run(shutdown_rx.clone()));

    // Pipeline consumer: inbound topic -> persist -> outbound fan-out.
    let pipeline = Arc::new(MessagePipeline::new(
        pool.clone(),
        publisher.clone(),
        config.log.outbound_topic.clone(),
    ));
    {
        let log_cfg = config.log.clone();
        let shutdown = shutdown_rx.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            let consumer = match Consumer::new(&log_cfg, &log_cfg.consumer_group) {
                Ok(consumer) => consumer,
                Err(e) => {
                    tracing::error!(error = %e, "failed to create pipeline consumer");
                    return;
                }
            };
            let result = consumer
                .run(&[&log_cfg.inbound_topic], shutdown, move |record| {
                    let pipeline = pipeline.clone();
                    async move { pipeline.process(&record.payload).await }
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "pipeline consumer halted");
            }
        });
    }

    // Fan-out consumer: outbound topic -> hub -> target socket. A record
    // that fails to decode is committed and skipped.
    {
        let log_cfg = config.log.clone();
        let fanout_group = format!("{}-fanout", config.log.consumer_group);
        let shutdown = shutdown_rx.clone();
        let hub = hub_handle.clone();
        tokio::spawn(async move {
            let consumer = match Consumer::new(&log_cfg, &fanout_group) {
                Ok(consumer) => consumer,
                Err(e) => {
                    tracing::error!(error = %e, "failed to create fan-out consumer");
                    return;
                }
            };
            let result = consumer
                .run(&[&log_cfg.outbound_topic], shutdown, move |record| {
                    let hub = hub.clone();
                    async move {
                        match serde_json::from_slice::<OutboundEnvelope>(&record.payload) {
                            Ok(envelope) => hub.deliver_direct(envelope),
                            Err(e) => {
                                tracing::warn!(error = %e, "skipping undecodable outbound record")
                            }
                        }
                        Ok(())
                    }
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "fan-out consumer halted");
            }
        });
    }

    // Friend-request consumer: materializes pending records from the events
    // the API server publishes.
    {
        let log_cfg = config.log.clone();
        let friend_group = format!("{}-friend-requests", config.log.consumer_group);
        let shutdown = shutdown_rx.clone();
        let pool = pool.clone();
        tokio::spawn(async move {
            let consumer = match Consumer::new(&log_cfg, &friend_group) {
                Ok(consumer) => consumer,
                Err(e) => {
                    tracing::error!(error = %e, "failed to create friend-request consumer");
                    return;
                }
            };
            let result = consumer
                .run(&[&log_cfg.friend_request_topic], shutdown, move |record| {
                    let pool = pool.clone();
                    async move {
                        ripple::service::friends::process_event(&pool, &record.payload).await
                    }
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "friend-request consumer halted");
            }
        });
    }

    let submitter = InboundSubmitter::new(publisher.clone(), config.log.inbound_topic.clone());
    let gateway_state = GatewayState {
        hub: hub_handle,
        submitter,
        auth: config.auth.clone(),
        revocation,
        web_socket: config.web_socket.clone(),
    };

    let app = Router::new()
        .route(&config.server.web_socket_path, get(ws_handler))
        .with_state(gateway_state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr()).await?;
    tracing::info!(path = %config.server.web_socket_path, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop consumers and the hub, then flush outstanding records.
    let _ = shutdown_tx.send(true);
    kafka.flush();
    tracing::info!("chat gateway stopped");
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
