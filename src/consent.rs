//! Consent state persisted across sessions.
//!
//! Consent is tri-state at read time: explicitly granted, explicitly
//! declined, or never answered. Only the literal stored strings `"true"`
//! and `"false"` count as explicit answers; anything else reads as unset.

use crate::storage::Storage;
use std::sync::Arc;

/// Storage key for the persisted consent flag.
pub const CONSENT_KEY: &str = "fintrack_cookie_consent";

/// Tri-state consent as read from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    /// The user explicitly granted consent.
    Granted,
    /// The user explicitly declined consent.
    Declined,
    /// No explicit answer recorded. Gates like "not given", but is not
    /// the same as a decline.
    Unset,
}

impl Consent {
    /// Interpret a stored value. Exact string comparison, per the wire
    /// format of the persisted flag.
    fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("true") => Consent::Granted,
            Some("false") => Consent::Declined,
            _ => Consent::Unset,
        }
    }
}

/// Gate deciding whether tracking payloads may carry real activity data.
pub struct ConsentGate {
    storage: Arc<dyn Storage>,
    required: bool,
}

impl ConsentGate {
    /// Create a gate. With `required = false` the gate is always open.
    pub fn new(storage: Arc<dyn Storage>, required: bool) -> Self {
        Self { storage, required }
    }

    /// Current tri-state consent as persisted.
    pub fn status(&self) -> Consent {
        Consent::from_stored(self.storage.get(CONSENT_KEY).as_deref())
    }

    /// Whether tracking may dispatch right now.
    pub fn is_granted(&self) -> bool {
        if !self.required {
            return true;
        }
        self.status() == Consent::Granted
    }

    /// Persist an explicit consent answer.
    ///
    /// Only records the value; notifying the collection endpoint and
    /// releasing or discarding queued events is the collector's job.
    pub fn record(&self, granted: bool) {
        self.storage.set(CONSENT_KEY, if granted { "true" } else { "false" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_absent_value_reads_unset() {
        let gate = ConsentGate::new(Arc::new(MemoryStorage::new()), true);
        assert_eq!(gate.status(), Consent::Unset);
        assert!(!gate.is_granted());
    }

    #[test]
    fn test_only_exact_literals_count() {
        let storage = Arc::new(MemoryStorage::new());
        let gate = ConsentGate::new(storage.clone(), true);

        storage.set(CONSENT_KEY, "true");
        assert_eq!(gate.status(), Consent::Granted);

        storage.set(CONSENT_KEY, "false");
        assert_eq!(gate.status(), Consent::Declined);

        // Close-but-wrong values all read as unset.
        for value in ["True", "TRUE", "1", "yes", ""] {
            storage.set(CONSENT_KEY, value);
            assert_eq!(gate.status(), Consent::Unset, "value {value:?}");
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let storage = Arc::new(MemoryStorage::new());
        let gate = ConsentGate::new(storage, true);

        gate.record(true);
        assert!(gate.is_granted());

        gate.record(false);
        assert_eq!(gate.status(), Consent::Declined);
        assert!(!gate.is_granted());
    }

    #[test]
    fn test_disabled_requirement_always_grants() {
        let gate = ConsentGate::new(Arc::new(MemoryStorage::new()), false);
        assert!(gate.is_granted());

        // Even an explicit decline does not close a disabled gate.
        gate.record(false);
        assert!(gate.is_granted());
        // The tri-state read still reports the stored answer.
        assert_eq!(gate.status(), Consent::Declined);
    }
}
