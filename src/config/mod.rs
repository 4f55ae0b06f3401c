//! Configuration management for the match-hall service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values for every engine.

pub mod app;
pub mod matchmaking;
pub mod rank;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, MatchTypeSettings, ServiceSettings};
pub use matchmaking::MatchmakingConfig;
pub use rank::{RankGroupSettings, RankSystemSettings};
