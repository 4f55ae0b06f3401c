//! Common types used throughout the matchmaking engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a participant; the engine only references it
pub type ParticipantId = String;

/// Unique identifier for an active match
pub type MatchId = String;

/// Logical tick counter supplied by the tick source
pub type Tick = u64;

/// Numeric rank score as stored in the external registry
pub type Score = i64;

/// Logical ticks in one second unless configured otherwise
pub const DEFAULT_TICKS_PER_SECOND: u64 = 20;

/// Registry key published while any match is counting down
pub const MATCH_STARTED_KEY: &str = "isStartMatch";

/// A leaderboard row for one participant of a rank system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub participant: ParticipantId,
    pub score: Score,
    pub tier: String,
}

/// Snapshot of a match type's queue, returned by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub title: String,
    pub waiting: Vec<ParticipantId>,
    pub waiting_count: usize,
    pub max_players_per_match: usize,
    pub active_matches: usize,
}

/// Private notification delivered to a participant through the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    QueueJoined {
        title: String,
    },
    QueueLeft {
        title: String,
    },
    AlreadyWaiting {
        title: String,
    },
    AlreadyInMatch {
        title: String,
        match_id: MatchId,
    },
    NotWaiting {
        title: String,
    },
    QueueStatus(QueueStatus),
    MatchFormed {
        title: String,
        match_id: MatchId,
        roster: Vec<ParticipantId>,
    },
    CountdownStarted {
        title: String,
        seconds: u64,
    },
    CountdownTick {
        title: String,
        remaining_seconds: i64,
    },
    MatchStarted {
        title: String,
        match_id: MatchId,
    },
    MatchEnded {
        title: String,
        match_id: MatchId,
    },
    MatchForceEnded {
        match_id: MatchId,
    },
    MatchNotFound {
        match_id: MatchId,
    },
    TierChanged {
        title: String,
        from: String,
        to: String,
    },
    Enrolled {
        title: String,
    },
    AlreadyEnrolled {
        title: String,
    },
    RankGroupUpdated {
        title: String,
        detail: String,
    },
    RankGroupRejected {
        title: String,
        reason: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::QueueJoined { title } => write!(f, "Added to the {} matchmaking queue.", title),
            Notice::QueueLeft { title } => {
                write!(f, "Removed from the {} matchmaking queue.", title)
            }
            Notice::AlreadyWaiting { title } => {
                write!(f, "You are already waiting in the {} queue.", title)
            }
            Notice::AlreadyInMatch { title, match_id } => {
                write!(f, "You are already in {} match {}.", title, match_id)
            }
            Notice::NotWaiting { title } => write!(f, "You are not waiting in the {} queue.", title),
            Notice::QueueStatus(status) => {
                if status.waiting.is_empty() {
                    write!(f, "{} queue: {} waiting", status.title, status.waiting_count)
                } else {
                    write!(
                        f,
                        "{} queue: {} waiting ({})",
                        status.title,
                        status.waiting_count,
                        status.waiting.join(", ")
                    )
                }
            }
            Notice::MatchFormed {
                title,
                match_id,
                roster,
            } => write!(
                f,
                "{} match formed (match id: {}). Players: {}",
                title,
                match_id,
                roster.join(", ")
            ),
            Notice::CountdownStarted { title, seconds } => {
                write!(f, "{} match starts in {} seconds!", title, seconds)
            }
            Notice::CountdownTick {
                title,
                remaining_seconds,
            } => write!(f, "{} match starts in {} seconds!", title, remaining_seconds),
            Notice::MatchStarted { title, match_id } => {
                write!(f, "{} match {} has started.", title, match_id)
            }
            Notice::MatchEnded { title, match_id } => {
                write!(f, "{} match {} has ended.", title, match_id)
            }
            Notice::MatchForceEnded { match_id } => {
                write!(f, "Match {} was force ended.", match_id)
            }
            Notice::MatchNotFound { match_id } => write!(f, "Match {} not found.", match_id),
            Notice::TierChanged { title, from, to } => {
                write!(f, "Your {} rank changed from {} to {}!", title, from, to)
            }
            Notice::Enrolled { title } => write!(f, "You joined {}!", title),
            Notice::AlreadyEnrolled { title } => write!(f, "You already joined {}.", title),
            Notice::RankGroupUpdated { title, detail } => write!(f, "[{}] {}", title, detail),
            Notice::RankGroupRejected { title, reason } => write!(f, "[{}] {}", title, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_rendering() {
        let notice = Notice::MatchFormed {
            title: "Duel".to_string(),
            match_id: "match_4k2".to_string(),
            roster: vec!["alice".to_string(), "bob".to_string()],
        };
        assert_eq!(
            notice.to_string(),
            "Duel match formed (match id: match_4k2). Players: alice, bob"
        );
    }

    #[test]
    fn test_notice_serializes_with_type_tag() {
        let notice = Notice::CountdownTick {
            title: "Duel".to_string(),
            remaining_seconds: 3,
        };
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["type"], "CountdownTick");
        assert_eq!(json["remaining_seconds"], 3);
    }
}
