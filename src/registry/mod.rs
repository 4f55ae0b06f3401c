//! External registry interface and the in-memory implementation
//!
//! The registry is a write-mostly numeric key/value store shared with systems
//! outside the engine. Rank scores live in it, and the engine publishes its
//! queue and match flags into it for other systems to observe.

use crate::error::{MatchmakingError, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Trait for the external numeric registry
pub trait ExternalRegistry: Send + Sync {
    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: i64) -> Result<()>;

    /// Read a value, `None` when the key is absent
    fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Enumerate every key currently present
    fn keys(&self) -> Result<Vec<String>>;
}

/// In-memory registry backed by an ordered map
///
/// Keys enumerate in lexical order. The store can be switched offline to
/// exercise the degraded paths of its callers.
#[derive(Debug)]
pub struct InMemoryRegistry {
    values: RwLock<BTreeMap<String, i64>>,
    available: AtomicBool,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability; an unavailable registry fails every call
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Copy of all entries (for testing and the stats endpoint)
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.values
            .read()
            .map(|values| values.clone())
            .unwrap_or_default()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MatchmakingError::StoreUnavailable {
                message: "registry is offline".to_string(),
            }
            .into())
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalRegistry for InMemoryRegistry {
    fn set(&self, key: &str, value: i64) -> Result<()> {
        self.ensure_available()?;
        let mut values = self
            .values
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire registry write lock".to_string(),
            })?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<i64>> {
        self.ensure_available()?;
        let values = self
            .values
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire registry read lock".to_string(),
            })?;
        Ok(values.get(key).copied())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.ensure_available()?;
        let mut values = self
            .values
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire registry write lock".to_string(),
            })?;
        values.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.ensure_available()?;
        let values = self
            .values
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire registry read lock".to_string(),
            })?;
        Ok(values.keys().cloned().collect())
    }
}
