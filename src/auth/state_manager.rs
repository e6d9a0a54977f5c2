//! Authorization `state` tokens for CSRF protection.
//!
//! Each authorization URL carries a fresh state value; the callback must
//! present it back exactly once, before it expires.

use crate::clock::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Issued state tokens with their issue time (epoch seconds)
#[derive(Clone)]
pub struct StateManager {
    states: Arc<Mutex<HashMap<String, i64>>>,
    expiry_seconds: i64,
    clock: Arc<dyn Clock>,
}

impl StateManager {
    /// Create a new state manager
    ///
    /// # Arguments
    /// * `expiry_seconds` - How long states remain valid (default: 600 = 10 minutes)
    pub fn new(expiry_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            expiry_seconds,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Generate a new state token and store it
    ///
    /// Returns the state token (UUID v4)
    pub fn create_state(&self) -> String {
        let state = Uuid::new_v4().to_string();
        self.lock().insert(state.clone(), self.clock.now());
        state
    }

    /// Validate and consume a state token
    ///
    /// True if the state was issued here and has not expired. The state is
    /// removed either way (single-use).
    pub fn validate_and_consume(&self, state: &str) -> bool {
        let Some(issued_at) = self.lock().remove(state) else {
            return false;
        };
        self.clock.now() - issued_at <= self.expiry_seconds
    }

    /// Drop expired states
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut states = self.lock();
        let before = states.len();
        states.retain(|_, issued_at| now - *issued_at <= self.expiry_seconds);
        before - states.len()
    }

    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_seconds
    }

    /// Count of outstanding states
    pub fn count(&self) -> usize {
        self.lock().len()
    }
}
