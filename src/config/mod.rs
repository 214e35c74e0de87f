//! # Configuration Module
//!
//! Session configuration: credential, model identifier, pacing and upload
//! scaling. Everything is supplied per run and held in memory only.

pub mod config;

pub use config::{PacingConfig, SessionConfig, parse_duration};
