//! Reelgate - moderation for media acquisition requests.
//!
//! This crate holds the pieces of the `reelgate` binary that are worth
//! testing on their own:
//!
//! - Application configuration (rules, classifier, storage) from one TOML file
//! - Wiring of storage, classifier and engine
//!
//! # Usage
//!
//! ```ignore
//! use reelgate_app::config::AppConfig;
//! use reelgate_app::wiring::build_engine;
//!
//! let config = AppConfig::load(None)?;
//! let db = std::sync::Arc::new(reelgate_app::wiring::open_database(&config)?);
//! let engine = build_engine(&config, db)?;
//! ```

pub mod config;
pub mod wiring;

pub use config::{AppConfig, AppConfigError, ClassifierSettings, StorageSettings};
