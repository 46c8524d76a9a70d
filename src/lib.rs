//! Image description service: authenticated upload, label detection, and a
//! client that turns the resulting sentence into speech.

pub mod analyze;
pub mod auth;
pub mod client;
pub mod config;
pub mod models;
pub mod server;
pub mod speech;
pub mod vision;
