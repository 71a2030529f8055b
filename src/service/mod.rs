//! Service layer
//!
//! Business rules over the repositories: conversation resolution, the
//! message pipeline, the friend-request workflow, groups, users and auth.
//! Handlers and consumer drivers call in here; nothing in this layer touches
//! HTTP or the socket.

pub mod auth;
pub mod conversations;
pub mod friends;
pub mod groups;
pub mod messages;
pub mod users;
