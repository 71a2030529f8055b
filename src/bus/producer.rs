//! Log producer
//!
//! Sends are durable: each awaits the broker delivery report before
//! returning, so a success means the record is on the log.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as _};
use rdkafka::util::Timeout;

use crate::config::LogConfig;
use crate::error::{AppError, Result};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Producer seam: publish one keyed record to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<()>;
}

pub struct KafkaPublisher {
    producer: FutureProducer,
}

impl KafkaPublisher {
    pub fn new(cfg: &LogConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", cfg.broker_list())
            .set("client.id", cfg.client_id.as_str())
            .set("security.protocol", cfg.protocol.as_str())
            .set("acks", "all")
            .create()
            .map_err(|e| AppError::Bus(format!("creating producer: {e}")))?;
        Ok(Self { producer })
    }

    /// Flush outstanding records with a bounded timeout; called on shutdown.
    pub fn flush(&self) {
        if let Err(e) = self.producer.flush(Timeout::After(FLUSH_TIMEOUT)) {
            tracing::warn!(error = %e, "producer flush incomplete on shutdown");
        }
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        self.producer
            .send(record, Timeout::After(DELIVERY_TIMEOUT))
            .await
            .map_err(|(e, _)| AppError::Bus(format!("delivery to '{topic}' failed: {e}")))?;
        Ok(())
    }
}
