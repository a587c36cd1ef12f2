//! Keeps a searchable mirror of watched folders in sync with the notifications
//! a file watcher publishes, and serves it back over a small REST API.
//!
//! transport → [`ingress`] → [`projector`] → [`store`]; independently,
//! HTTP → [`api`] → [`store`].

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod ingress;
pub mod logging;
pub mod node;
pub mod notification;
pub mod output;
pub mod projector;
pub mod store;
pub mod transport;
