//! Log consumer driver
//!
//! Polls a consumer-group subscription and hands each record to a handler.
//! The offset is committed only after the handler returns `Ok`, so a handler
//! error leaves the record uncommitted for redelivery (at-least-once).
//! Handlers are expected to swallow permanently bad input (malformed
//! payloads) and return `Ok` so poison records cannot stall the partition.

use std::future::Future;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as _, StreamConsumer};
use rdkafka::Message as _;
use tokio::sync::watch;

use crate::config::LogConfig;
use crate::error::{AppError, Result};

/// Owned view of a consumed record, decoupled from the client library so
/// handlers stay plain functions over bytes.
#[derive(Debug, Clone)]
pub struct Record {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

pub struct Consumer {
    inner: StreamConsumer,
    group: String,
}

impl Consumer {
    pub fn new(cfg: &LogConfig, group: &str) -> Result<Self> {
        let inner: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", cfg.broker_list())
            .set("client.id", cfg.client_id.as_str())
            .set("group.id", group)
            .set("security.protocol", cfg.protocol.as_str())
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| AppError::Bus(format!("creating consumer for group '{group}': {e}")))?;
        Ok(Self {
            inner,
            group: group.to_string(),
        })
    }

    /// Consume until the shutdown signal flips. Returns `Err` only on fatal
    /// client errors; transient poll errors are logged and polling continues.
    pub async fn run<F, Fut>(
        &self,
        topics: &[&str],
        mut shutdown: watch::Receiver<bool>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(Record) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.inner
            .subscribe(topics)
            .map_err(|e| AppError::Bus(format!("subscribing to {topics:?}: {e}")))?;

        tracing::info!(group = %self.group, ?topics, "log consumer started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(group = %self.group, "log consumer shutting down");
                    return Ok(());
                }
                polled = self.inner.recv() => {
                    let message = match polled {
                        Ok(message) => message,
                        Err(e) => {
                            if e.rdkafka_error_code()
                                .map(|c| c == rdkafka::types::RDKafkaErrorCode::Fatal)
                                .unwrap_or(false)
                            {
                                tracing::error!(group = %self.group, error = %e, "fatal consumer error");
                                return Err(AppError::Bus(format!("fatal consumer error: {e}")));
                            }
                            tracing::warn!(group = %self.group, error = %e, "consumer poll error");
                            continue;
                        }
                    };

                    let record = Record {
                        topic: message.topic().to_string(),
                        partition: message.partition(),
                        offset: message.offset(),
                        key: message.key().map(|k| k.to_vec()),
                        payload: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
                    };

                    match handler(record).await {
                        Ok(()) => {
                            if let Err(e) = self.inner.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    group = %self.group,
                                    topic = message.topic(),
                                    offset = message.offset(),
                                    error = %e,
                                    "offset commit failed"
                                );
                            }
                        }
                        Err(e) => {
                            // Transient failure: leave the offset uncommitted
                            // so the record is redelivered.
                            tracing::warn!(
                                group = %self.group,
                                topic = message.topic(),
                                offset = message.offset(),
                                error = %e,
                                "handler failed, record left uncommitted"
                            );
                        }
                    }
                }
            }
        }
    }
}
