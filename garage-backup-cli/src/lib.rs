//! Client library for the garage backup API.
//!
//! Drives the server's `/api/backup` and `/api/collections` endpoints over
//! HTTP: create and download archives, list stored ones, restore from a local
//! file or a stored archive.

pub mod client;
pub mod config;
pub mod utils;

pub use client::BackupClient;
pub use config::Config;
pub use utils::errors::CliError;
pub type Result<T> = std::result::Result<T, CliError>;
