//! Write-only projection of engine state into the external registry
//!
//! Every call is fire-and-forget: registry failures are logged and swallowed
//! so the engine keeps running on its in-memory state.

use crate::registry::ExternalRegistry;
use crate::types::MATCH_STARTED_KEY;
use crate::utils::match_token;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct StatusPublisher {
    registry: Arc<dyn ExternalRegistry>,
    title: String,
}

impl StatusPublisher {
    pub fn new(registry: Arc<dyn ExternalRegistry>, title: impl Into<String>) -> Self {
        Self {
            registry,
            title: title.into(),
        }
    }

    fn waiting_key(participant: &str) -> String {
        format!("{}:waiting", participant)
    }

    fn match_id_key(participant: &str) -> String {
        format!("{}:matchId", participant)
    }

    fn player_key(participant: &str) -> String {
        format!("{}:player", participant)
    }

    pub fn set_waiting(&self, participant: &str, waiting: bool) {
        self.set(&Self::waiting_key(participant), i64::from(waiting));
    }

    /// Publish the numeric token of the participant's match
    pub fn set_match_id(&self, participant: &str, match_id: &str) {
        self.set(&Self::match_id_key(participant), match_token(match_id));
    }

    pub fn clear_match_id(&self, participant: &str) {
        self.remove(&Self::match_id_key(participant));
    }

    pub fn set_player(&self, participant: &str) {
        self.set(&Self::player_key(participant), 0);
    }

    pub fn clear_player(&self, participant: &str) {
        self.remove(&Self::player_key(participant));
    }

    pub fn set_match_started(&self, started: bool) {
        self.set(MATCH_STARTED_KEY, i64::from(started));
    }

    fn set(&self, key: &str, value: i64) {
        if let Err(e) = self.registry.set(key, value) {
            warn!(
                "[{}] Failed to publish {} = {}: {}",
                self.title, key, value, e
            );
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.registry.remove(key) {
            warn!("[{}] Failed to remove {}: {}", self.title, key, e);
        }
    }
}

impl std::fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;

    #[test]
    fn test_published_keys() {
        let registry = Arc::new(InMemoryRegistry::new());
        let publisher = StatusPublisher::new(registry.clone(), "Duel");

        publisher.set_waiting("alice", true);
        publisher.set_match_id("alice", "match_a1b2c3xyz");
        publisher.set_player("alice");
        publisher.set_match_started(true);

        assert_eq!(registry.get("alice:waiting").unwrap(), Some(1));
        assert_eq!(registry.get("alice:matchId").unwrap(), Some(123));
        assert_eq!(registry.get("alice:player").unwrap(), Some(0));
        assert_eq!(registry.get("isStartMatch").unwrap(), Some(1));

        publisher.clear_match_id("alice");
        publisher.clear_player("alice");
        assert_eq!(registry.get("alice:matchId").unwrap(), None);
        assert_eq!(registry.get("alice:player").unwrap(), None);
    }

    #[test]
    fn test_registry_outage_is_swallowed() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.set_available(false);
        let publisher = StatusPublisher::new(registry.clone(), "Duel");

        publisher.set_waiting("alice", true);
        publisher.clear_match_id("alice");

        registry.set_available(true);
        assert_eq!(registry.get("alice:waiting").unwrap(), None);
    }
}
