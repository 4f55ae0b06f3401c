//! Rank tiers, score storage and tier label synchronization
//!
//! This module maps numeric scores onto named tiers, persists scores in the
//! external registry and keeps participants' tier labels current.

pub mod store;
pub mod system;
pub mod tier;

// Re-export commonly used types
pub use store::RankStore;
pub use system::RankSystem;
pub use tier::{RankTable, RankTier};
