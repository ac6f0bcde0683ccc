//! Layer 3: user reputation.
//!
//! The layer score is the user's stored trust, untransformed. After every
//! completed validation the outcome feeds back into that trust: +0.1 for a
//! validated report, -0.15 for a flagged one, clamped to [0, 1].

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::decision::Status;
use crate::report::{clamp01, TrustProfile, UserId};

pub const TRUST_INCREMENT: f64 = 0.1;
pub const TRUST_DECREMENT: f64 = 0.15;

/// Read-modify-write step applied to one profile.
pub type TrustUpdate = Box<dyn FnOnce(TrustProfile) -> TrustProfile + Send>;

/// External user store. Implementations must apply `update` atomically per user.
#[async_trait]
pub trait TrustStore: Send + Sync {
    async fn get(&self, user: UserId) -> Result<Option<TrustProfile>>;

    /// Unknown users start from `TrustProfile::default()`.
    async fn update(&self, user: UserId, update: TrustUpdate) -> Result<TrustProfile>;
}

/// Process-local store; each entry is updated under its shard lock.
#[derive(Debug, Default)]
pub struct InMemoryTrustStore {
    profiles: DashMap<UserId, TrustProfile>,
}

impl InMemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserId, profile: TrustProfile) {
        self.profiles.insert(user, profile);
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl TrustStore for InMemoryTrustStore {
    async fn get(&self, user: UserId) -> Result<Option<TrustProfile>> {
        Ok(self.profiles.get(&user).map(|p| *p))
    }

    async fn update(&self, user: UserId, update: TrustUpdate) -> Result<TrustProfile> {
        let mut entry = self.profiles.entry(user).or_default();
        let next = update(*entry);
        *entry = next;
        Ok(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReputationScore {
    pub score: f64,
    /// False when the user had no stored profile and the default was used.
    pub known_user: bool,
}

#[derive(Clone)]
pub struct ReputationScorer {
    store: Arc<dyn TrustStore>,
}

impl ReputationScorer {
    pub fn new(store: Arc<dyn TrustStore>) -> Self {
        Self { store }
    }

    /// Current trust for `user` as the layer score.
    pub async fn validate(&self, user: UserId) -> Result<ReputationScore> {
        let profile = self.store.get(user).await?;
        Ok(match profile {
            Some(p) => ReputationScore {
                score: clamp01(p.trust_score),
                known_user: true,
            },
            None => ReputationScore {
                score: TrustProfile::INITIAL_TRUST,
                known_user: false,
            },
        })
    }

    /// Feed a final decision back into the user's profile.
    pub async fn record_outcome(&self, user: UserId, outcome: Status) -> Result<TrustProfile> {
        self.store
            .update(
                user,
                Box::new(move |p| TrustProfile {
                    trust_score: update_trust(p.trust_score, outcome),
                    total_reports: p.total_reports + 1,
                    verified_reports: p.verified_reports + u64::from(outcome == Status::Validated),
                }),
            )
            .await
    }
}

/// Trust update rule, clamped to [0, 1].
pub fn update_trust(current: f64, outcome: Status) -> f64 {
    let next = match outcome {
        Status::Validated => current + TRUST_INCREMENT,
        Status::Flagged => current - TRUST_DECREMENT,
    };
    clamp01(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_rule_examples() {
        assert!((update_trust(0.5, Status::Validated) - 0.6).abs() < 1e-12);
        assert_eq!(update_trust(0.05, Status::Flagged), 0.0);
        assert_eq!(update_trust(0.95, Status::Validated), 1.0);
    }

    #[test]
    fn update_always_clamped() {
        for start in [-3.0, -0.1, 0.0, 0.07, 0.5, 0.93, 1.0, 1.4, 9.0] {
            for outcome in [Status::Validated, Status::Flagged] {
                let t = update_trust(start, outcome);
                assert!((0.0..=1.0).contains(&t), "{start} {outcome:?} -> {t}");
            }
        }
    }

    #[tokio::test]
    async fn unknown_user_gets_default_trust() {
        let scorer = ReputationScorer::new(Arc::new(InMemoryTrustStore::new()));
        let s = scorer.validate(42).await.unwrap();
        assert_eq!(s.score, 0.5);
        assert!(!s.known_user);
    }

    #[tokio::test]
    async fn record_outcome_updates_counters() {
        let store = Arc::new(InMemoryTrustStore::new());
        let scorer = ReputationScorer::new(store.clone());

        let p = scorer.record_outcome(7, Status::Validated).await.unwrap();
        assert!((p.trust_score - 0.6).abs() < 1e-12);
        assert_eq!((p.total_reports, p.verified_reports), (1, 1));

        let p = scorer.record_outcome(7, Status::Flagged).await.unwrap();
        assert!((p.trust_score - 0.45).abs() < 1e-12);
        assert_eq!((p.total_reports, p.verified_reports), (2, 1));

        let s = scorer.validate(7).await.unwrap();
        assert!(s.known_user);
        assert!((s.score - 0.45).abs() < 1e-12);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_for_one_user_do_not_race() {
        let store = Arc::new(InMemoryTrustStore::new());
        store.insert(
            1,
            TrustProfile {
                trust_score: 0.0,
                ..TrustProfile::default()
            },
        );
        let scorer = ReputationScorer::new(store.clone());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let s = scorer.clone();
            handles.push(tokio::spawn(async move {
                s.record_outcome(1, Status::Validated).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let p = store.get(1).await.unwrap().unwrap();
        assert_eq!(p.total_reports, 50);
        assert_eq!(p.verified_reports, 50);
        assert_eq!(p.trust_score, 1.0);
    }
}
