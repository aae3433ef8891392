//! Data models.

pub mod config;

pub use config::FigcapConfig;
