//! ripple: real-time instant-messaging backend
//!
//! Two processes share this crate. The chat gateway (`chatserver`) owns the
//! client sockets: frames go through the hub onto the inbound log topic, the
//! message pipeline persists and fans out, and the fan-out consumer delivers
//! to whichever sockets are local. The API server (`apiserver`) carries the
//! out-of-band surface: auth, profiles, conversations, groups, friend
//! requests and uploads.
//!
//! # Module structure
//!
//! - **`gateway`**: hub, per-connection pumps, socket admission
//! - **`service`**: resolver, message pipeline, friend workflow, groups
//! - **`bus`**: Kafka producer and consumer driver (at-least-once)
//! - **`repo`**: sqlx repositories over Postgres
//! - **`api`**: axum HTTP surface with bearer-token middleware
//! - **`auth`**: JWT, bcrypt, Redis-backed session revocation
//! - **`storage`**: local/S3 blob store behind one capability

pub mod api;
pub mod auth;
pub mod bus;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod repo;
pub mod service;
pub mod storage;
pub mod wire;
