//! Session identity with a sliding inactivity window.
//!
//! A session groups activity from one client. The identifier is a random
//! UUID v4 persisted alongside a last-activity timestamp; as long as
//! activity keeps arriving within the timeout the same id is reused, and
//! every tracked action pushes the window forward. Once the gap exceeds
//! the timeout a fresh id is minted.

use crate::storage::Storage;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Storage key for the session identifier.
pub const SESSION_ID_KEY: &str = "fintrack_session_id";

/// Storage key for the last-activity timestamp (epoch milliseconds).
pub const SESSION_TIMESTAMP_KEY: &str = "fintrack_session_timestamp";

/// Manages the persistent session identifier.
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    timeout: Duration,
    /// Id handed out during this process lifetime; once set it is reused
    /// without re-checking staleness, matching per-page-load semantics.
    current: Mutex<Option<String>>,
}

impl SessionManager {
    /// Create a session manager over the given storage.
    pub fn new(storage: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self {
            storage,
            timeout,
            current: Mutex::new(None),
        }
    }

    /// Get the session id, minting a new one when absent or stale.
    ///
    /// Every call refreshes the last-activity timestamp. Never fails: with
    /// unusable storage the id simply lives in memory.
    pub fn session_id(&self) -> String {
        let mut current = self.current.lock().unwrap();
        if let Some(id) = current.as_ref() {
            let id = id.clone();
            drop(current);
            self.touch();
            return id;
        }

        let id = match self.stored_valid_id() {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                tracing::debug!(session_id = %id, "minted new session");
                self.storage.set(SESSION_ID_KEY, &id);
                id
            }
        };

        *current = Some(id.clone());
        drop(current);
        self.touch();
        id
    }

    /// Refresh the last-activity timestamp (sliding expiration).
    pub fn touch(&self) {
        self.storage
            .set(SESSION_TIMESTAMP_KEY, &Utc::now().timestamp_millis().to_string());
    }

    /// Read the stored id, provided its last activity is within the window.
    fn stored_valid_id(&self) -> Option<String> {
        let id = self.storage.get(SESSION_ID_KEY)?;
        let stored_ts = self.storage.get(SESSION_TIMESTAMP_KEY)?;
        let last_activity: i64 = stored_ts.parse().ok()?;

        let age_ms = Utc::now().timestamp_millis() - last_activity;
        if age_ms < 0 || age_ms as u128 >= self.timeout.as_millis() {
            return None;
        }
        Some(id)
    }
}
