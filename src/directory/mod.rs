//! Participant directory interface and the in-memory implementation
//!
//! The directory owns participant sessions. The engine only asks it whether a
//! participant is reachable, manages labels on reachable participants, and
//! sends them notices.

use crate::error::{MatchmakingError, Result};
use crate::types::{Notice, ParticipantId};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// Notices and broadcasts kept by [`InMemoryDirectory`] before the oldest are evicted
pub const DEFAULT_LOG_CAPACITY: usize = 4096;

/// Trait for the participant directory collaborator
pub trait ParticipantDirectory: Send + Sync {
    /// Whether the participant currently has a live session
    fn is_reachable(&self, participant: &str) -> Result<bool>;

    /// All participants with a live session
    fn reachable(&self) -> Result<Vec<ParticipantId>>;

    /// Labels attached to a participant
    fn labels(&self, participant: &str) -> Result<Vec<String>>;

    /// Attach a label to a participant
    fn add_label(&self, participant: &str, label: &str) -> Result<()>;

    /// Remove a label from a participant
    fn remove_label(&self, participant: &str, label: &str) -> Result<()>;

    /// Send a private notice to one participant
    fn notify(&self, participant: &str, notice: &Notice) -> Result<()>;

    /// Show a status line to every reachable participant
    fn broadcast_status(&self, line: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    reachable: BTreeSet<ParticipantId>,
    labels: HashMap<ParticipantId, BTreeSet<String>>,
    notices: VecDeque<(ParticipantId, Notice)>,
    broadcasts: VecDeque<String>,
}

/// Append to a bounded log, evicting from the front once full
fn record<T>(log: &mut VecDeque<T>, capacity: usize, entry: T) {
    if capacity == 0 {
        return;
    }
    while log.len() >= capacity {
        log.pop_front();
    }
    log.push_back(entry);
}

/// In-memory directory that records the most recent notices and broadcasts
///
/// Notices addressed to participants without a session are dropped, the same
/// way a live directory cannot deliver to a handle it cannot resolve. Each log
/// keeps at most `log_capacity` entries.
#[derive(Debug)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
    available: AtomicBool,
    log_capacity: usize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Directory keeping the newest `capacity` notices and broadcasts; 0 records nothing
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
            available: AtomicBool::new(true),
            log_capacity: capacity,
        }
    }

    /// Open a session for a participant
    pub fn connect(&self, participant: &str) {
        if let Ok(mut state) = self.state.write() {
            state.reachable.insert(participant.to_string());
        }
    }

    /// Close a participant's session; labels are kept
    pub fn disconnect(&self, participant: &str) {
        if let Ok(mut state) = self.state.write() {
            state.reachable.remove(participant);
        }
    }

    /// Toggle availability; an unavailable directory fails every call
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Recorded notices in delivery order
    pub fn notices(&self) -> Vec<(ParticipantId, Notice)> {
        self.state
            .read()
            .map(|state| state.notices.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Notices delivered to one participant
    pub fn notices_for(&self, participant: &str) -> Vec<Notice> {
        self.state
            .read()
            .map(|state| {
                state
                    .notices
                    .iter()
                    .filter(|(to, _)| to == participant)
                    .map(|(_, notice)| notice.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Recorded broadcast lines, oldest first
    pub fn broadcasts(&self) -> Vec<String> {
        self.state
            .read()
            .map(|state| state.broadcasts.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget recorded notices and broadcasts
    pub fn clear_log(&self) {
        if let Ok(mut state) = self.state.write() {
            state.notices.clear();
            state.broadcasts.clear();
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MatchmakingError::StoreUnavailable {
                message: "participant directory is offline".to_string(),
            }
            .into())
        }
    }

    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, DirectoryState>> {
        self.ensure_available()?;
        self.state.read().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire directory read lock".to_string(),
            }
            .into()
        })
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, DirectoryState>> {
        self.ensure_available()?;
        self.state.write().map_err(|_| {
            MatchmakingError::InternalError {
                message: "Failed to acquire directory write lock".to_string(),
            }
            .into()
        })
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticipantDirectory for InMemoryDirectory {
    fn is_reachable(&self, participant: &str) -> Result<bool> {
        Ok(self.read_state()?.reachable.contains(participant))
    }

    fn reachable(&self) -> Result<Vec<ParticipantId>> {
        Ok(self.read_state()?.reachable.iter().cloned().collect())
    }

    fn labels(&self, participant: &str) -> Result<Vec<String>> {
        Ok(self
            .read_state()?
            .labels
            .get(participant)
            .map(|labels| labels.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn add_label(&self, participant: &str, label: &str) -> Result<()> {
        self.write_state()?
            .labels
            .entry(participant.to_string())
            .or_default()
            .insert(label.to_string());
        Ok(())
    }

    fn remove_label(&self, participant: &str, label: &str) -> Result<()> {
        if let Some(labels) = self.write_state()?.labels.get_mut(participant) {
            labels.remove(label);
        }
        Ok(())
    }

    fn notify(&self, participant: &str, notice: &Notice) -> Result<()> {
        let mut state = self.write_state()?;
        if !state.reachable.contains(participant) {
            debug!("Dropping notice for unreachable participant '{}'", participant);
            return Ok(());
        }
        debug!("Notice to '{}': {}", participant, notice);
        record(
            &mut state.notices,
            self.log_capacity,
            (participant.to_string(), notice.clone()),
        );
        Ok(())
    }

    fn broadcast_status(&self, line: &str) -> Result<()> {
        let mut state = self.write_state()?;
        record(&mut state.broadcasts, self.log_capacity, line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(title: &str) -> Notice {
        Notice::QueueJoined {
            title: title.to_string(),
        }
    }

    #[test]
    fn test_notices_only_reach_connected_participants() {
        let directory = InMemoryDirectory::new();
        directory.connect("alice");

        directory.notify("alice", &joined("Duel")).unwrap();
        directory.notify("bob", &joined("Duel")).unwrap();

        assert_eq!(directory.notices_for("alice"), vec![joined("Duel")]);
        assert!(directory.notices_for("bob").is_empty());
    }

    #[test]
    fn test_labels_survive_disconnect() {
        let directory = InMemoryDirectory::new();
        directory.connect("alice");
        directory.add_label("alice", "ranked:Gold").unwrap();
        directory.disconnect("alice");

        assert!(!directory.is_reachable("alice").unwrap());
        assert_eq!(
            directory.labels("alice").unwrap(),
            vec!["ranked:Gold".to_string()]
        );

        directory.remove_label("alice", "ranked:Gold").unwrap();
        assert!(directory.labels("alice").unwrap().is_empty());
    }

    #[test]
    fn test_logs_keep_only_newest_entries() {
        let directory = InMemoryDirectory::with_log_capacity(3);
        directory.connect("alice");

        for i in 0..10 {
            directory.notify("alice", &joined(&format!("Duel{}", i))).unwrap();
            directory.broadcast_status(&format!("[Duel] {}/4", i)).unwrap();
        }

        assert_eq!(
            directory.notices_for("alice"),
            vec![joined("Duel7"), joined("Duel8"), joined("Duel9")]
        );
        assert_eq!(
            directory.broadcasts(),
            vec!["[Duel] 7/4", "[Duel] 8/4", "[Duel] 9/4"]
        );
    }

    #[test]
    fn test_default_log_is_bounded() {
        let directory = InMemoryDirectory::new();
        directory.connect("alice");

        for _ in 0..DEFAULT_LOG_CAPACITY + 100 {
            directory.notify("alice", &joined("Duel")).unwrap();
            directory.broadcast_status("[Duel] 1/4").unwrap();
        }

        assert_eq!(directory.notices().len(), DEFAULT_LOG_CAPACITY);
        assert_eq!(directory.broadcasts().len(), DEFAULT_LOG_CAPACITY);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let directory = InMemoryDirectory::with_log_capacity(0);
        directory.connect("alice");
        directory.notify("alice", &joined("Duel")).unwrap();
        directory.broadcast_status("[Duel] 1/4").unwrap();

        assert!(directory.notices().is_empty());
        assert!(directory.broadcasts().is_empty());
    }

    #[test]
    fn test_offline_directory_fails() {
        let directory = InMemoryDirectory::new();
        directory.set_available(false);
        assert!(directory.reachable().is_err());
        assert!(directory.broadcast_status("[Duel] 1/4").is_err());
    }
}
