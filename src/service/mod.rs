//! Service layer for the match-hall matchmaking service
//!
//! This module contains the main application state, the tick loop and
//! background task management for the production service.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError, SharedEngine, SimulationSettings};
pub use health::{HealthCheck, HealthStatus};
