//! Concurrency-safe, expiring OTP state.
//!
//! One record per `(identity, purpose)`, held in a `DashMap`. Every mutation
//! of a key runs under that key's shard write guard, so two validations of
//! the same code are serialized while unrelated identities proceed in
//! parallel.
//!
//! Expiry is lazy: reads treat a record past `expires_at` as absent whether
//! or not the reaper has run. [`OtpStore::purge_expired`] only reclaims
//! memory.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::record::{OtpKey, OtpPurpose, OtpRecord, OtpState};

/// Result of one validation attempt, decided atomically under the key's guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    NotFound,
    /// The record had expired and has been removed.
    Expired,
    Locked,
    /// The check passed and the record was removed. Single-use.
    Consumed(OtpRecord),
    /// The check failed and one attempt was spent. `locked_now` is true for
    /// exactly the attempt that exhausted the budget.
    Rejected { attempts_left: u32, locked_now: bool },
}

/// In-memory OTP record store.
#[derive(Debug, Default)]
pub struct OtpStore {
    records: DashMap<OtpKey, OtpRecord>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record`, replacing any previous record for the same key.
    pub fn put(&self, record: OtpRecord) -> Option<OtpRecord> {
        self.records.insert(record.key(), record)
    }

    /// Returns the live record, treating an expired one as absent.
    pub fn get(&self, identity: &str, purpose: OtpPurpose, now: DateTime<Utc>) -> Option<OtpRecord> {
        self.records
            .get(&OtpKey::new(identity, purpose))
            .filter(|r| !r.is_expired(now))
            .map(|r| r.value().clone())
    }

    /// Spends one attempt and locks the record when the budget hits zero.
    ///
    /// Returns the updated record, or `None` if there is no live unlocked
    /// record to decrement.
    pub fn decrement_attempt(
        &self,
        identity: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Option<OtpRecord> {
        let mut record = self.records.get_mut(&OtpKey::new(identity, purpose))?;
        if record.is_expired(now) || record.locked {
            return None;
        }
        spend_attempt(&mut record);
        Some(record.clone())
    }

    pub fn delete(&self, identity: &str, purpose: OtpPurpose) -> Option<OtpRecord> {
        self.records
            .remove(&OtpKey::new(identity, purpose))
            .map(|(_, r)| r)
    }

    /// Runs one full validation transition for a key.
    ///
    /// `check` sees the live, unlocked record and reports whether the
    /// presented code matches. The lookup, the check, and the resulting
    /// consume or decrement all happen under a single write guard.
    pub fn attempt<F>(
        &self,
        identity: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
        check: F,
    ) -> AttemptOutcome
    where
        F: FnOnce(&OtpRecord) -> bool,
    {
        let mut entry = match self.records.entry(OtpKey::new(identity, purpose)) {
            Entry::Vacant(_) => return AttemptOutcome::NotFound,
            Entry::Occupied(entry) => entry,
        };

        match entry.get().state(now) {
            OtpState::Expired => {
                entry.remove();
                return AttemptOutcome::Expired;
            }
            OtpState::Locked => return AttemptOutcome::Locked,
            OtpState::Issued => {}
        }
        if check(entry.get()) {
            return AttemptOutcome::Consumed(entry.remove());
        }

        let record = entry.get_mut();
        spend_attempt(record);
        AttemptOutcome::Rejected {
            attempts_left: record.attempts_remaining,
            locked_now: record.locked,
        }
    }

    /// Drops every expired record. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| !r.is_expired(now));
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn spend_attempt(record: &mut OtpRecord) {
    record.attempts_remaining = record.attempts_remaining.saturating_sub(1);
    if record.attempts_remaining == 0 {
        record.locked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::{Arc, Barrier};
    use std::thread;

    const ID: &str = "alice@example.com";
    const P: OtpPurpose = OtpPurpose::PasswordChange;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn record(identity: &str, attempts: u32) -> OtpRecord {
        OtpRecord {
            identity: identity.to_string(),
            purpose: P,
            code_hash: [1; 32],
            salt: [2; 16],
            issued_at: t0(),
            expires_at: t0() + Duration::minutes(5),
            attempts_remaining: attempts,
            locked: false,
        }
    }

    #[test]
    fn put_replaces_previous_record() {
        let store = OtpStore::new();
        store.put(record(ID, 1));
        let previous = store.put(record(ID, 5));
        assert_eq!(previous.map(|r| r.attempts_remaining), Some(1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(ID, P, t0()).unwrap().attempts_remaining, 5);
    }

    #[test]
    fn purposes_are_independent() {
        let store = OtpStore::new();
        store.put(record(ID, 3));
        assert!(store.get(ID, OtpPurpose::EmailVerify, t0()).is_none());
    }

    #[test]
    fn get_treats_expired_as_absent() {
        let store = OtpStore::new();
        store.put(record(ID, 3));
        assert!(store.get(ID, P, t0() + Duration::minutes(5)).is_none());
        // lazy: still physically present until purged
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn decrement_locks_at_zero() {
        let store = OtpStore::new();
        store.put(record(ID, 2));
        let r = store.decrement_attempt(ID, P, t0()).unwrap();
        assert_eq!((r.attempts_remaining, r.locked), (1, false));
        let r = store.decrement_attempt(ID, P, t0()).unwrap();
        assert_eq!((r.attempts_remaining, r.locked), (0, true));
        assert!(store.decrement_attempt(ID, P, t0()).is_none());
    }

    #[test]
    fn delete_removes_record() {
        let store = OtpStore::new();
        store.put(record(ID, 3));
        assert!(store.delete(ID, P).is_some());
        assert!(store.delete(ID, P).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn attempt_consumes_on_match() {
        let store = OtpStore::new();
        store.put(record(ID, 3));
        assert!(matches!(store.attempt(ID, P, t0(), |_| true), AttemptOutcome::Consumed(_)));
        assert_eq!(store.attempt(ID, P, t0(), |_| true), AttemptOutcome::NotFound);
    }

    #[test]
    fn attempt_reports_expiry_once() {
        let store = OtpStore::new();
        store.put(record(ID, 3));
        let late = t0() + Duration::minutes(6);
        assert_eq!(store.attempt(ID, P, late, |_| true), AttemptOutcome::Expired);
        assert_eq!(store.attempt(ID, P, late, |_| true), AttemptOutcome::NotFound);
    }

    #[test]
    fn attempt_never_runs_check_on_locked_record() {
        let store = OtpStore::new();
        let mut r = record(ID, 0);
        r.locked = true;
        store.put(r);
        let outcome = store.attempt(ID, P, t0(), |_| panic!("check must not run"));
        assert_eq!(outcome, AttemptOutcome::Locked);
    }

    #[test]
    fn attempt_on_locked_and_expired_record_reports_expiry() {
        let store = OtpStore::new();
        let mut r = record(ID, 0);
        r.locked = true;
        store.put(r);
        let late = t0() + Duration::minutes(5);
        assert_eq!(
            store.attempt(ID, P, late, |_| panic!("check must not run")),
            AttemptOutcome::Expired
        );
        assert!(store.is_empty());
    }

    #[test]
    fn purge_expired_counts_removed() {
        let store = OtpStore::new();
        store.put(record("a@x.io", 3));
        let mut fresh = record("b@x.io", 3);
        fresh.expires_at = t0() + Duration::hours(1);
        store.put(fresh);
        assert_eq!(store.purge_expired(t0() + Duration::minutes(10)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_wrong_guesses_lock_exactly_once() {
        const THREADS: usize = 16;
        const BUDGET: u32 = 3;

        let store = Arc::new(OtpStore::new());
        store.put(record(ID, BUDGET));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.attempt(ID, P, t0(), |_| false)
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let rejected = outcomes
            .iter()
            .filter(|o| matches!(o, AttemptOutcome::Rejected { .. }))
            .count();
        let locked_now = outcomes
            .iter()
            .filter(|o| matches!(o, AttemptOutcome::Rejected { locked_now: true, .. }))
            .count();
        let locked = outcomes
            .iter()
            .filter(|o| matches!(o, AttemptOutcome::Locked))
            .count();

        assert_eq!(rejected, BUDGET as usize);
        assert_eq!(locked_now, 1);
        assert_eq!(locked, THREADS - BUDGET as usize);
    }

    #[test]
    fn concurrent_correct_guesses_consume_exactly_once() {
        const THREADS: usize = 16;

        let store = Arc::new(OtpStore::new());
        store.put(record(ID, 1));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.attempt(ID, P, t0(), |_| true)
                })
            })
            .collect();

        let consumed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, AttemptOutcome::Consumed(_)))
            .count();
        assert_eq!(consumed, 1);
    }

    #[test]
    fn unrelated_identities_do_not_interfere() {
        let store = Arc::new(OtpStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let id = format!("user{i}@example.com");
                    store.put(record(&id, 2));
                    store.attempt(&id, P, t0(), |_| false)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(
                h.join().unwrap(),
                AttemptOutcome::Rejected {
                    attempts_left: 1,
                    locked_now: false
                }
            );
        }
    }
}
