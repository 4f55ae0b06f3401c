//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the match-hall
//! service, including readiness and liveness probes.

use crate::directory::ParticipantDirectory;
use crate::registry::ExternalRegistry;
use crate::service::app::AppState;
use crate::utils::current_timestamp;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, TryLockError};
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Numeric form used by the health gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Unhealthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Healthy => 2,
        }
    }

    fn combine(&mut self, component: &HealthStatus) {
        match component {
            HealthStatus::Unhealthy => *self = HealthStatus::Unhealthy,
            HealthStatus::Degraded if *self == HealthStatus::Healthy => {
                *self = HealthStatus::Degraded
            }
            _ => {}
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Totals across every match type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_matches: usize,
    pub participants_waiting: usize,
    pub participants_queued: u64,
    pub matches_formed: u64,
    pub matches_started: u64,
    pub current_tick: u64,
    /// Service uptime information
    pub uptime_info: String,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }

        let checks = vec![
            service_check,
            Self::check_engines(&app_state),
            Self::check_registry(&app_state),
            Self::check_directory(&app_state),
        ];
        for check in &checks[1..] {
            overall_status.combine(&check.status);
        }

        let stats = Self::gather_service_stats(&app_state);

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: current_timestamp(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - the service runs and every engine is usable
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_engines(&app_state).status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// A poisoned engine lock means a tick panicked mid-update
    fn check_engines(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let poisoned: Vec<&str> = app_state
            .engines()
            .iter()
            .filter(|(_, engine)| matches!(engine.try_lock(), Err(TryLockError::Poisoned(_))))
            .map(|(title, _)| title.as_str())
            .collect();

        let (status, message) = if poisoned.is_empty() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some(format!("Engine lock poisoned: {}", poisoned.join(", "))),
            )
        };

        ComponentCheck {
            name: "engines".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Engines keep running on in-memory state while the registry is down
    fn check_registry(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.registry().keys() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Degraded,
                Some(format!("Registry unreachable: {}", e)),
            ),
        };

        ComponentCheck {
            name: "registry".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_directory(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.directory().reachable() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (
                HealthStatus::Degraded,
                Some(format!("Directory unreachable: {}", e)),
            ),
        };

        ComponentCheck {
            name: "directory".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let engine_stats = app_state.engine_stats();
        debug!("Gathering service stats from {} engines", engine_stats.len());

        let mut stats = engine_stats
            .values()
            .fold(ServiceStats::default(), |mut totals, engine| {
                totals.active_matches += engine.active_matches;
                totals.participants_waiting += engine.participants_waiting;
                totals.participants_queued += engine.participants_queued;
                totals.matches_formed += engine.matches_formed;
                totals.matches_started += engine.matches_started;
                totals
            });

        stats.current_tick = app_state.current_tick();
        stats.uptime_info = format!(
            "Tick {} at {} ticks/s",
            stats.current_tick,
            app_state.config().service.ticks_per_second
        );
        stats
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
