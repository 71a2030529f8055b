//! HTTP handlers

pub mod auth;
pub mod conversations;
pub mod friends;
pub mod groups;
pub mod upload;
pub mod users;
