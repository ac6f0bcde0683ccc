//! # Recent report cache
//! Bounded FIFO of recently validated reports, used as context for spatial
//! consensus.
//!
//! Appends are serialised behind a mutex; readers take a copy, so clustering
//! always sees a consistent snapshot even while other validations append.

use std::{collections::VecDeque, sync::Mutex};

use crate::report::ContextReport;

pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Thread-safe bounded window over recent context reports.
#[derive(Debug)]
pub struct RecentReportCache {
    inner: Mutex<VecDeque<ContextReport>>,
    capacity: usize,
}

impl RecentReportCache {
    /// A capacity of 0 is bumped to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(10_000))),
            capacity,
        }
    }

    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Append and evict the oldest entries beyond capacity.
    pub fn push(&self, report: ContextReport) {
        let mut buf = self.inner.lock().expect("report cache mutex poisoned");
        buf.push_back(report);
        while buf.len() > self.capacity {
            buf.pop_front();
        }
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<ContextReport> {
        let buf = self.inner.lock().expect("report cache mutex poisoned");
        buf.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("report cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecentReportCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn ctx(id: u64) -> ContextReport {
        ContextReport {
            id: Some(id),
            lat: 20.0,
            lon: 85.0,
            depth_m: 0.5,
            timestamp: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let c = RecentReportCache::with_capacity(3);
        for i in 0..5 {
            c.push(ctx(i));
        }
        let ids: Vec<_> = c.snapshot().iter().map(|r| r.id.unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_is_bumped() {
        let c = RecentReportCache::with_capacity(0);
        c.push(ctx(1));
        c.push(ctx(2));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn never_exceeds_default_capacity_under_concurrency() {
        let c = Arc::new(RecentReportCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        c.push(ctx(t * 1000 + i));
                        assert!(c.len() <= DEFAULT_CACHE_CAPACITY);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.len(), DEFAULT_CACHE_CAPACITY);
    }
}
