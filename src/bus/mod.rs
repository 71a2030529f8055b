//! Log bus
//!
//! Durable, partitioned, at-least-once messaging over Kafka. Two seams:
//! [`Publisher`] for producing (trait, so services can be exercised with an
//! in-memory sink) and [`Consumer::run`] for the poll/handle/commit loop.

mod consumer;
mod producer;

pub use consumer::{Consumer, Record};
pub use producer::{KafkaPublisher, Publisher};
