//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the match-hall service using
//! Prometheus metrics, labelled by match type and rank system.

use crate::matchmaking::EngineStats;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue and match metrics
    match_metrics: MatchMetrics,

    /// Rank system metrics
    rank_metrics: RankMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Logical ticks processed
    pub ticks_total: IntCounter,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue and match metrics, labelled by match type
#[derive(Clone)]
pub struct MatchMetrics {
    /// Participants currently waiting
    pub participants_waiting: IntGaugeVec,

    /// Matches currently active
    pub active_matches: IntGaugeVec,

    /// Total participants accepted into a queue
    pub participants_queued_total: IntCounterVec,

    /// Total matches formed
    pub matches_formed_total: IntCounterVec,

    /// Total matches whose countdown completed
    pub matches_started_total: IntCounterVec,

    /// Total matches ended by an admin
    pub matches_force_ended_total: IntCounterVec,

    /// Total participants dropped for matching no rank group
    pub participants_dropped_total: IntCounterVec,
}

/// Rank system metrics
#[derive(Clone)]
pub struct RankMetrics {
    /// Stored participants per tier
    pub tier_population: IntGaugeVec,

    /// Corrections made by label reconciliation
    pub reconcile_corrections_total: IntCounterVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time spent processing one logical tick across all engines
    pub tick_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let rank_metrics = RankMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            match_metrics,
            rank_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get queue and match metrics
    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    /// Get rank metrics
    pub fn rank(&self) -> &RankMetrics {
        &self.rank_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Update metrics from engine stats
    ///
    /// Counters advance by the difference to `previous`, gauges take the
    /// current values.
    pub fn update_from_engine_stats(
        &self,
        match_type: &str,
        previous: &EngineStats,
        current: &EngineStats,
    ) {
        let labels = [match_type];
        let m = &self.match_metrics;

        m.participants_queued_total
            .with_label_values(&labels)
            .inc_by(current.participants_queued.saturating_sub(previous.participants_queued));
        m.matches_formed_total
            .with_label_values(&labels)
            .inc_by(current.matches_formed.saturating_sub(previous.matches_formed));
        m.matches_started_total
            .with_label_values(&labels)
            .inc_by(current.matches_started.saturating_sub(previous.matches_started));
        m.matches_force_ended_total
            .with_label_values(&labels)
            .inc_by(
                current
                    .matches_force_ended
                    .saturating_sub(previous.matches_force_ended),
            );
        m.participants_dropped_total
            .with_label_values(&labels)
            .inc_by(
                current
                    .participants_dropped_unranked
                    .saturating_sub(previous.participants_dropped_unranked),
            );

        // Update current state
        m.participants_waiting
            .with_label_values(&labels)
            .set(current.participants_waiting as i64);
        m.active_matches
            .with_label_values(&labels)
            .set(current.active_matches as i64);
    }

    /// Record the tier population of a rank system
    pub fn update_tier_population(&self, rank_system: &str, population: &[(String, usize)]) {
        for (tier, count) in population {
            self.rank_metrics
                .tier_population
                .with_label_values(&[rank_system, tier.as_str()])
                .set(*count as i64);
        }
    }

    /// Record corrections made by a reconciliation pass
    pub fn record_reconcile(&self, rank_system: &str, corrections: usize) {
        self.rank_metrics
            .reconcile_corrections_total
            .with_label_values(&[rank_system])
            .inc_by(corrections as u64);
    }

    /// Record one processed tick
    pub fn record_tick(&self, duration: Duration) {
        self.service_metrics.ticks_total.inc();
        self.performance_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
    }

    /// Uptime in logical seconds
    pub fn set_uptime(&self, seconds: u64) {
        self.service_metrics.uptime_seconds.set(seconds as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("match_hall_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let ticks_total = IntCounter::new("match_hall_ticks_total", "Logical ticks processed")?;
        registry.register(Box::new(ticks_total.clone()))?;

        let health_status = IntGauge::new(
            "match_hall_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("match_hall_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            ticks_total,
            health_status,
            component_health,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let participants_waiting = IntGaugeVec::new(
            Opts::new(
                "match_hall_participants_waiting",
                "Participants currently waiting in queue",
            ),
            &["match_type"],
        )?;
        registry.register(Box::new(participants_waiting.clone()))?;

        let active_matches = IntGaugeVec::new(
            Opts::new("match_hall_active_matches", "Number of active matches"),
            &["match_type"],
        )?;
        registry.register(Box::new(active_matches.clone()))?;

        let participants_queued_total = IntCounterVec::new(
            Opts::new(
                "match_hall_participants_queued_total",
                "Total participants queued",
            ),
            &["match_type"],
        )?;
        registry.register(Box::new(participants_queued_total.clone()))?;

        let matches_formed_total = IntCounterVec::new(
            Opts::new("match_hall_matches_formed_total", "Total matches formed"),
            &["match_type"],
        )?;
        registry.register(Box::new(matches_formed_total.clone()))?;

        let matches_started_total = IntCounterVec::new(
            Opts::new("match_hall_matches_started_total", "Total matches started"),
            &["match_type"],
        )?;
        registry.register(Box::new(matches_started_total.clone()))?;

        let matches_force_ended_total = IntCounterVec::new(
            Opts::new(
                "match_hall_matches_force_ended_total",
                "Total matches force ended",
            ),
            &["match_type"],
        )?;
        registry.register(Box::new(matches_force_ended_total.clone()))?;

        let participants_dropped_total = IntCounterVec::new(
            Opts::new(
                "match_hall_participants_dropped_total",
                "Participants dropped for matching no rank group",
            ),
            &["match_type"],
        )?;
        registry.register(Box::new(participants_dropped_total.clone()))?;

        Ok(Self {
            participants_waiting,
            active_matches,
            participants_queued_total,
            matches_formed_total,
            matches_started_total,
            matches_force_ended_total,
            participants_dropped_total,
        })
    }
}

impl RankMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tier_population = IntGaugeVec::new(
            Opts::new("match_hall_tier_population", "Stored participants per tier"),
            &["rank_system", "tier"],
        )?;
        registry.register(Box::new(tier_population.clone()))?;

        let reconcile_corrections_total = IntCounterVec::new(
            Opts::new(
                "match_hall_reconcile_corrections_total",
                "Corrections made by label reconciliation",
            ),
            &["rank_system"],
        )?;
        registry.register(Box::new(reconcile_corrections_total.clone()))?;

        Ok(Self {
            tier_population,
            reconcile_corrections_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tick_duration = Histogram::with_opts(
            HistogramOpts::new(
                "match_hall_tick_duration_seconds",
                "Time spent processing one logical tick",
            )
            .buckets(vec![0.00001, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        Ok(Self { tick_duration })
    }
}
