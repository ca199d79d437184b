//! `numerolog` - A numerology chat bot and the REST API behind its mini-app
//!
//! This library provides the numerology calculations, the persistent user
//! store, the conversation handling for the chat platform and the HTTP
//! service that exposes the webhook and the mini-app API.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod ai;
pub mod api;
pub mod bot;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod numerology;
pub mod server;
pub mod storage;
pub mod telegram;

#[cfg(test)]
pub(crate) mod testing;

pub use api::Api;
pub use bot::Bot;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use notifications::{NotificationSummary, Notifier};
pub use storage::{Storage, StorageStats};
