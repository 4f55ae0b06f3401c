//! Metrics and monitoring for the match-hall service
//!
//! This module provides Prometheus metrics collection and the HTTP endpoints
//! used for health probes, scraping and queue inspection.

pub mod collector;
pub mod health;

pub use collector::{
    MatchMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, RankMetrics, ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
