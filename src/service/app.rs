//! Main application state and service coordination
//!
//! This module contains the production AppState that owns every matchmaking
//! engine, the shared rank systems and collaborators, and drives them from a
//! logical tick loop.

use crate::config::AppConfig;
use crate::directory::InMemoryDirectory;
use crate::matchmaking::{EngineStats, MatchmakingEngine};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::rank::RankSystem;
use crate::registry::InMemoryRegistry;
use crate::types::Tick;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Engine shared between the tick loop and request handlers
pub type SharedEngine = Arc<Mutex<MatchmakingEngine>>;

/// Synthetic arrivals used to exercise the pipeline without a command facade
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Participants enqueued per match type on every wave
    pub participants_per_wave: usize,
    /// Ticks between two waves
    pub wave_interval_ticks: u64,
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// External collaborators
    registry: Arc<InMemoryRegistry>,
    directory: Arc<InMemoryDirectory>,

    /// Rank systems by title
    rank_systems: BTreeMap<String, Arc<RankSystem>>,

    /// Matchmaking engines by match type title
    engines: BTreeMap<String, SharedEngine>,

    /// Metrics collector for monitoring
    metrics_collector: Arc<MetricsCollector>,

    /// Health server, present while the service is running
    health_server: tokio::sync::Mutex<Option<Arc<HealthServer>>>,

    /// Background task handles
    background_tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    /// Logical tick counter
    current_tick: AtomicU64,

    /// Engine stats at the last metrics refresh
    reported_stats: Mutex<HashMap<String, EngineStats>>,

    simulation: Option<SimulationSettings>,
}

impl AppState {
    /// Build rank systems and engines from the configuration
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing match-hall matchmaking service");
        info!(
            "Configuration: service={}, match types={}, rank systems={}",
            config.service.name,
            config.match_types.len(),
            config.rank_systems.len()
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let registry = Arc::new(InMemoryRegistry::new());
        let directory = Arc::new(InMemoryDirectory::new());

        let mut rank_systems = BTreeMap::new();
        for settings in &config.rank_systems {
            let system = RankSystem::from_tiers(
                settings.title.clone(),
                settings.rank_key.clone(),
                settings.tiers.clone(),
                settings.thresholds.clone(),
                registry.clone(),
                directory.clone(),
            )
            .map_err(|e| ServiceError::Configuration {
                message: format!("Rank system {}: {}", settings.title, e),
            })?;
            system.attach_existing();
            rank_systems.insert(settings.title.clone(), Arc::new(system));
        }

        let rank_keys: Vec<String> = config
            .rank_systems
            .iter()
            .map(|settings| settings.rank_key.clone())
            .collect();

        let mut engines = BTreeMap::new();
        for match_type in &config.match_types {
            let rank_system = match &match_type.rank_system {
                Some(name) => Some(rank_systems.get(name).cloned().ok_or_else(|| {
                    ServiceError::Configuration {
                        message: format!(
                            "Match type {} references unknown rank system {}",
                            match_type.title, name
                        ),
                    }
                })?),
                None => None,
            };

            let engine = MatchmakingEngine::new(
                match_type.title.clone(),
                match_type.matchmaking.clone(),
                rank_system,
                registry.clone(),
                directory.clone(),
            )
            .and_then(|engine| engine.with_rank_groups(&match_type.rank_groups))
            .map_err(|e| ServiceError::Configuration {
                message: format!("Match type {}: {}", match_type.title, e),
            })?
            .with_reserved_ids(rank_keys.iter().cloned());

            engines.insert(match_type.title.clone(), Arc::new(Mutex::new(engine)));
        }

        Ok(Self {
            config,
            registry,
            directory,
            rank_systems,
            engines,
            metrics_collector,
            health_server: tokio::sync::Mutex::new(None),
            background_tasks: tokio::sync::Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            current_tick: AtomicU64::new(0),
            reported_stats: Mutex::new(HashMap::new()),
            simulation: None,
        })
    }

    /// Enqueue synthetic participants every five seconds
    pub fn with_simulation(mut self, participants_per_wave: usize) -> Self {
        if participants_per_wave > 0 {
            self.simulation = Some(SimulationSettings {
                participants_per_wave,
                wave_interval_ticks: self.config.service.ticks_per_second * 5,
            });
        }
        self
    }

    /// Start the tick loop and the health server
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting match-hall matchmaking service");

        self.start_engines().await?;
        self.start_health_server().await?;

        info!("✅ match-hall matchmaking service started successfully");
        Ok(())
    }

    /// Mark the service running and spawn the tick loop
    pub async fn start_engines(self: &Arc<Self>) -> Result<(), ServiceError> {
        *self.is_running.write().await = true;

        let period = self.config.tick_period();
        info!(
            "Starting tick loop ({} ticks/s, {:?} per tick)",
            self.config.service.ticks_per_second, period
        );

        let state = self.clone();
        let tick_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Tick loop started");

            while *state.is_running.read().await {
                interval.tick().await;
                state.tick_once();
            }

            info!("Tick loop stopped at tick {}", state.current_tick());
        });

        self.background_tasks.lock().await.push(tick_task);
        Ok(())
    }

    async fn start_health_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let port = self.config.service.health_port;
        info!("Starting metrics and health endpoints on port {}", port);

        let health_config = HealthServerConfig {
            port,
            host: "0.0.0.0".to_string(),
        };
        let server = Arc::new(
            HealthServer::new(health_config, self.metrics_collector.clone())
                .with_app_state(self.clone()),
        );
        *self.health_server.lock().await = Some(server.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {}", e);
            } else {
                info!("Health server task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);

        // Give the server a moment to start up
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of match-hall service");

        // Mark as not running
        *self.is_running.write().await = false;

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            }
        }

        self.stop_background_tasks().await;

        for (title, stats) in &self.engine_stats() {
            info!("Final statistics for {}: {:?}", title, stats);
        }
        info!("✅ match-hall service shutdown completed");
        Ok(())
    }

    /// Advance every engine by one logical tick
    ///
    /// Once per second of logical time the rank systems are reconciled and
    /// metrics refreshed. Returns the tick that was processed.
    pub fn tick_once(&self) -> Tick {
        let timer = self.metrics_collector.start_timer();
        let now = self.current_tick.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(simulation) = &self.simulation {
            if now % simulation.wave_interval_ticks.max(1) == 0 {
                self.simulate_wave(simulation.participants_per_wave);
            }
        }

        for (title, engine) in &self.engines {
            match engine.lock() {
                Ok(mut engine) => engine.tick(now),
                Err(_) => error!("Engine {} lock poisoned, skipping tick {}", title, now),
            }
        }

        let ticks_per_second = self.config.service.ticks_per_second.max(1);
        if now % ticks_per_second == 0 {
            self.metrics_collector.set_uptime(now / ticks_per_second);
            self.reconcile_rank_systems();
            self.refresh_metrics();
        }

        self.metrics_collector.record_tick(timer.stop());
        now
    }

    /// Bring every rank system's stored scores and labels back in line
    pub fn reconcile_rank_systems(&self) {
        for (title, system) in &self.rank_systems {
            let corrections = system.reconcile();
            if corrections > 0 {
                debug!("Rank system {} reconciled {} participants", title, corrections);
            }
            self.metrics_collector.record_reconcile(title, corrections);
        }
    }

    fn refresh_metrics(&self) {
        let current = self.engine_stats();
        match self.reported_stats.lock() {
            Ok(mut reported) => {
                for (title, stats) in &current {
                    let previous = reported.get(title).cloned().unwrap_or_default();
                    self.metrics_collector
                        .update_from_engine_stats(title, &previous, stats);
                    reported.insert(title.clone(), stats.clone());
                }
            }
            Err(_) => warn!("Metrics snapshot lock poisoned, skipping refresh"),
        }

        for (title, system) in &self.rank_systems {
            self.metrics_collector
                .update_tier_population(title, &system.tier_population());
        }
    }

    /// Let idle synthetic participants join every match type
    fn simulate_wave(&self, per_wave: usize) {
        let mut rng = rand::thread_rng();
        for (title, engine) in &self.engines {
            let Ok(mut engine) = engine.lock() else {
                warn!("Engine {} lock poisoned, skipping simulation wave", title);
                continue;
            };

            let prefix = title.to_lowercase().replace(' ', "-");
            let mut joined = 0;
            for index in 0..per_wave * 4 {
                if joined == per_wave {
                    break;
                }
                let participant = format!("sim-{}-{}", prefix, index);
                if engine.is_waiting(&participant) || engine.match_of(&participant).is_some() {
                    continue;
                }

                self.directory.connect(&participant);
                if let Some(system) = engine.rank_system() {
                    let ceiling = system
                        .table()
                        .tiers()
                        .last()
                        .map(|tier| tier.threshold)
                        .unwrap_or(0);
                    system.set_score(&participant, rng.gen_range(0..=ceiling.max(0)));
                }
                if engine.join(&participant).is_ok() {
                    joined += 1;
                }
            }
            debug!("Simulation wave queued {} participants for {}", joined, title);
        }
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick.load(Ordering::SeqCst)
    }

    pub fn engine(&self, title: &str) -> Option<SharedEngine> {
        self.engines.get(title).cloned()
    }

    pub fn engines(&self) -> &BTreeMap<String, SharedEngine> {
        &self.engines
    }

    pub fn rank_system(&self, title: &str) -> Option<Arc<RankSystem>> {
        self.rank_systems.get(title).cloned()
    }

    pub fn rank_systems(&self) -> &BTreeMap<String, Arc<RankSystem>> {
        &self.rank_systems
    }

    pub fn registry(&self) -> Arc<InMemoryRegistry> {
        self.registry.clone()
    }

    pub fn directory(&self) -> Arc<InMemoryDirectory> {
        self.directory.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// Stats of every engine whose lock is healthy
    pub fn engine_stats(&self) -> BTreeMap<String, EngineStats> {
        self.engines
            .iter()
            .filter_map(|(title, engine)| {
                engine
                    .lock()
                    .ok()
                    .map(|engine| (title.clone(), engine.stats()))
            })
            .collect()
    }
}
