//! Fingerprint-keyed question cache with single-flight generation.
//!
//! The first caller to miss on a fingerprint installs a pending slot and is
//! handed a [`PendingGuard`]; every concurrent caller for the same fingerprint
//! receives a [`Waiter`] on the same watch channel instead of triggering a
//! duplicate upstream call. Distinct fingerprints never serialize against
//! each other.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, Entry};
use tokio::sync::watch;
use tokio::time::Instant;

use super::model::{Fingerprint, Question};

/// Shared, immutable question set as stored in the cache.
pub type CachedSet = Arc<Vec<Question>>;

/// State of an in-flight generation, published to waiters.
#[derive(Clone)]
enum PendingState {
    InFlight,
    Done(CachedSet),
    Failed,
}

enum Slot {
    Ready {
        questions: CachedSet,
        expires_at: Instant,
    },
    Pending {
        rx: watch::Receiver<PendingState>,
    },
}

/// Outcome of a cache lookup.
pub enum Lookup {
    /// Fresh entry served directly.
    Hit(CachedSet),
    /// Another caller is already generating this fingerprint.
    Wait(Waiter),
    /// Nobody is generating; the caller now owns the pending slot.
    Vacant(PendingGuard),
}

/// Handle on a generation another caller is running.
pub struct Waiter {
    rx: watch::Receiver<PendingState>,
}

impl Waiter {
    /// Wait until the in-flight generation settles.
    ///
    /// Returns `None` when the generation failed or its guard was dropped
    /// without completing.
    pub async fn outcome(mut self) -> Option<CachedSet> {
        loop {
            match self.rx.borrow_and_update().clone() {
                PendingState::InFlight => {}
                PendingState::Done(set) => return Some(set),
                PendingState::Failed => return None,
            }
            if self.rx.changed().await.is_err() {
                // Sender gone; whatever was last published is final.
                return match self.rx.borrow().clone() {
                    PendingState::Done(set) => Some(set),
                    _ => None,
                };
            }
        }
    }
}

/// Exclusive right to fill one fingerprint's slot.
///
/// Dropping the guard without calling [`fulfill`](Self::fulfill) counts as a
/// failed generation: waiters are notified and the slot is cleared so the
/// next lookup can retry.
pub struct PendingGuard {
    entries: Arc<DashMap<Fingerprint, Slot>>,
    fingerprint: Fingerprint,
    tx: watch::Sender<PendingState>,
    ttl: Duration,
    settled: bool,
}

impl PendingGuard {
    /// Publish a generated set: waiters are woken and the slot becomes a
    /// ready entry with a fresh TTL.
    pub fn fulfill(mut self, questions: Vec<Question>) -> CachedSet {
        self.settled = true;
        let set: CachedSet = Arc::new(questions);
        self.entries.insert(
            self.fingerprint.clone(),
            Slot::Ready {
                questions: set.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        let _ = self.tx.send(PendingState::Done(set.clone()));
        set
    }

    /// Report the generation as failed, releasing the slot.
    pub fn fail(mut self) {
        self.settled = true;
        self.abandon();
    }

    fn abandon(&mut self) {
        self.entries
            .remove_if(&self.fingerprint, |_, slot| matches!(slot, Slot::Pending { .. }));
        let _ = self.tx.send(PendingState::Failed);
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.abandon();
        }
    }
}

/// Process-wide cache of generated question sets keyed by criteria fingerprint.
pub struct QuestionCache {
    entries: Arc<DashMap<Fingerprint, Slot>>,
    ttl: Duration,
}

impl QuestionCache {
    /// Build an empty cache whose entries live for `ttl` after being filled.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Look up `fingerprint`, installing a pending slot on a miss.
    ///
    /// Expired entries are evicted here, lazily; there is no background
    /// sweeper.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Lookup {
        match self.entries.entry(fingerprint.clone()) {
            Entry::Occupied(mut occupied) => {
                match occupied.get() {
                    Slot::Ready {
                        questions,
                        expires_at,
                    } if *expires_at > Instant::now() => {
                        return Lookup::Hit(questions.clone());
                    }
                    Slot::Pending { rx } => {
                        return Lookup::Wait(Waiter { rx: rx.clone() });
                    }
                    // Expired entry; reuse the slot for a fresh generation.
                    Slot::Ready { .. } => {}
                }
                let (guard, slot) = self.pending(fingerprint);
                occupied.insert(slot);
                Lookup::Vacant(guard)
            }
            Entry::Vacant(vacant) => {
                let (guard, slot) = self.pending(fingerprint);
                vacant.insert(slot);
                Lookup::Vacant(guard)
            }
        }
    }

    /// Drop every entry, pending slots included.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of live slots, ready and pending alike.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache currently holds no slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn pending(&self, fingerprint: &Fingerprint) -> (PendingGuard, Slot) {
        let (tx, rx) = watch::channel(PendingState::InFlight);
        let guard = PendingGuard {
            entries: self.entries.clone(),
            fingerprint: fingerprint.clone(),
            tx,
            ttl: self.ttl,
            settled: false,
        };
        (guard, Slot::Pending { rx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::model::{Difficulty, GenerationCriteria};
    use uuid::Uuid;

    fn fingerprint_for(topic: &str) -> Fingerprint {
        GenerationCriteria {
            topics: vec![topic.to_string()],
            ..GenerationCriteria::default()
        }
        .fingerprint()
    }

    fn question(prompt: &str) -> Question {
        Question {
            id: Uuid::new_v4(),
            category: "science".into(),
            prompt: prompt.into(),
            choices: vec!["a".into(), "b".into()],
            correct_choice: 0,
            difficulty: Difficulty::Medium,
            time_limit_secs: 20,
            point_value: 75,
            fun_fact: None,
        }
    }

    #[tokio::test]
    async fn miss_then_fulfill_then_hit() {
        let cache = QuestionCache::new(Duration::from_secs(60));
        let fp = fingerprint_for("space");

        let Lookup::Vacant(guard) = cache.lookup(&fp) else {
            panic!("first lookup must miss");
        };
        guard.fulfill(vec![question("q1")]);

        match cache.lookup(&fp) {
            Lookup::Hit(set) => assert_eq!(set.len(), 1),
            _ => panic!("second lookup must hit"),
        }
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_generation() {
        let cache = QuestionCache::new(Duration::from_secs(60));
        let fp = fingerprint_for("history");

        let Lookup::Vacant(guard) = cache.lookup(&fp) else {
            panic!("first lookup must miss");
        };
        let Lookup::Wait(waiter) = cache.lookup(&fp) else {
            panic!("second lookup must wait on the in-flight generation");
        };

        let joined = tokio::spawn(waiter.outcome());
        guard.fulfill(vec![question("q1"), question("q2")]);

        let set = joined.await.unwrap().expect("waiter sees the result");
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn dropped_guard_fails_waiters_and_frees_the_slot() {
        let cache = QuestionCache::new(Duration::from_secs(60));
        let fp = fingerprint_for("music");

        let Lookup::Vacant(guard) = cache.lookup(&fp) else {
            panic!("first lookup must miss");
        };
        let Lookup::Wait(waiter) = cache.lookup(&fp) else {
            panic!("second lookup must wait");
        };

        drop(guard);
        assert!(waiter.outcome().await.is_none());
        assert!(matches!(cache.lookup(&fp), Lookup::Vacant(_)));
    }

    #[tokio::test]
    async fn explicit_failure_frees_the_slot() {
        let cache = QuestionCache::new(Duration::from_secs(60));
        let fp = fingerprint_for("sports");

        let Lookup::Vacant(guard) = cache.lookup(&fp) else {
            panic!("first lookup must miss");
        };
        guard.fail();
        assert!(matches!(cache.lookup(&fp), Lookup::Vacant(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_evicted_on_lookup() {
        let cache = QuestionCache::new(Duration::from_secs(30));
        let fp = fingerprint_for("cinema");

        let Lookup::Vacant(guard) = cache.lookup(&fp) else {
            panic!("first lookup must miss");
        };
        guard.fulfill(vec![question("q1")]);
        assert!(matches!(cache.lookup(&fp), Lookup::Hit(_)));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(cache.lookup(&fp), Lookup::Vacant(_)));
    }

    #[tokio::test]
    async fn unrelated_fingerprints_do_not_serialize() {
        let cache = QuestionCache::new(Duration::from_secs(60));

        let Lookup::Vacant(_guard_a) = cache.lookup(&fingerprint_for("space")) else {
            panic!("first fingerprint must miss");
        };
        // The second fingerprint gets its own slot even while the first is
        // still pending.
        assert!(matches!(
            cache.lookup(&fingerprint_for("history")),
            Lookup::Vacant(_)
        ));
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = QuestionCache::new(Duration::from_secs(60));
        let fp = fingerprint_for("space");

        let Lookup::Vacant(guard) = cache.lookup(&fp) else {
            panic!("first lookup must miss");
        };
        guard.fulfill(vec![question("q1")]);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(matches!(cache.lookup(&fp), Lookup::Vacant(_)));
    }
}
