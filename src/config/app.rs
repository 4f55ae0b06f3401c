//! Main application configuration
//!
//! This module defines the primary configuration structures for the match-hall
//! service, including file and environment variable loading and validation.

use crate::config::matchmaking::MatchmakingConfig;
use crate::config::rank::{RankGroupSettings, RankSystemSettings};
use crate::types::DEFAULT_TICKS_PER_SECOND;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Fastest tick rate whose period is still at least one microsecond
pub const MAX_TICKS_PER_SECOND: u64 = 1_000_000;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub rank_systems: Vec<RankSystemSettings>,
    pub match_types: Vec<MatchTypeSettings>,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Rate of the logical tick loop
    pub ticks_per_second: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// One match type hosted by the service, backed by its own engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchTypeSettings {
    /// Match type name, used in logs, notices and metrics
    pub title: String,
    /// Title of the rank system used for rank-bracket grouping
    #[serde(default)]
    pub rank_system: Option<String>,
    #[serde(flatten)]
    pub matchmaking: MatchmakingConfig,
    /// Rank groups installed at startup
    #[serde(default)]
    pub rank_groups: Vec<RankGroupSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            rank_systems: vec![RankSystemSettings::default()],
            match_types: vec![
                MatchTypeSettings {
                    title: "Casual".to_string(),
                    rank_system: None,
                    matchmaking: MatchmakingConfig::default(),
                    rank_groups: Vec::new(),
                },
                MatchTypeSettings {
                    title: "Ranked".to_string(),
                    rank_system: Some("Ranked".to_string()),
                    matchmaking: MatchmakingConfig {
                        rank_range_enabled: true,
                        ..MatchmakingConfig::default()
                    },
                    rank_groups: vec![
                        RankGroupSettings::new("low", "Bronze", "Silver"),
                        RankGroupSettings::new("high", "Silver", "Gold"),
                    ],
                },
            ],
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "match-hall".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.sync_tick_rate();
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(rate) = env::var("TICKS_PER_SECOND") {
            self.service.ticks_per_second = rate
                .parse()
                .map_err(|_| anyhow!("Invalid TICKS_PER_SECOND value: {}", rate))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        Ok(())
    }

    /// Engines count countdowns in ticks of the service's tick loop
    pub fn sync_tick_rate(&mut self) {
        for match_type in &mut self.match_types {
            match_type.matchmaking.ticks_per_second = self.service.ticks_per_second;
        }
    }

    pub fn rank_system(&self, title: &str) -> Option<&RankSystemSettings> {
        self.rank_systems.iter().find(|system| system.title == title)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Wall-clock length of one logical tick
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.service.ticks_per_second.max(1))
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timing
    if config.service.ticks_per_second == 0 {
        return Err(anyhow!("Ticks per second must be greater than 0"));
    }
    if config.service.ticks_per_second > MAX_TICKS_PER_SECOND {
        return Err(anyhow!(
            "Ticks per second cannot exceed {}, got {}",
            MAX_TICKS_PER_SECOND,
            config.service.ticks_per_second
        ));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate rank systems
    let mut rank_titles = HashSet::new();
    for system in &config.rank_systems {
        system.validate()?;
        if !rank_titles.insert(system.title.as_str()) {
            return Err(anyhow!("Duplicate rank system title: {}", system.title));
        }
    }

    // Validate match types
    if config.match_types.is_empty() {
        return Err(anyhow!("At least one match type must be configured"));
    }
    let mut titles = HashSet::new();
    for match_type in &config.match_types {
        if match_type.title.is_empty() {
            return Err(anyhow!("Match type title cannot be empty"));
        }
        if !titles.insert(match_type.title.as_str()) {
            return Err(anyhow!("Duplicate match type title: {}", match_type.title));
        }
        if let Some(rank_system) = &match_type.rank_system {
            if !rank_titles.contains(rank_system.as_str()) {
                return Err(anyhow!(
                    "Match type {} references unknown rank system {}",
                    match_type.title,
                    rank_system
                ));
            }
        }
        match_type
            .matchmaking
            .validate()
            .with_context(|| format!("Invalid matchmaking settings for {}", match_type.title))?;
    }

    Ok(())
}
