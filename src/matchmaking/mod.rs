//! Matchmaking: waiting pool, grouping, match countdowns and state publication

pub mod engine;
pub mod grouper;
pub mod groups;
pub mod instance;
pub mod publisher;
pub mod waiting;

// Re-export commonly used types
pub use engine::{EngineStats, MatchmakingEngine};
pub use grouper::{group_by_rank, group_random, FormedGroup, GroupingOutcome, GroupingStrategy};
pub use groups::{RankGroup, RankGroupConfig};
pub use instance::{CountdownStep, Match, MatchState};
pub use publisher::StatusPublisher;
pub use waiting::WaitingSet;
