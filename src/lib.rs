//! Match Hall - tick-driven matchmaking engine
//!
//! This crate groups waiting participants into matches, optionally bracketed
//! by rank tiers, runs start countdowns, and publishes queue and match state
//! into an external numeric registry.

pub mod config;
pub mod directory;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod rank;
pub mod registry;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{matchmaking_error, MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use directory::{InMemoryDirectory, ParticipantDirectory};
pub use matchmaking::MatchmakingEngine;
pub use rank::RankSystem;
pub use registry::{ExternalRegistry, InMemoryRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
