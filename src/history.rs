//! history.rs: bounded in-memory log of recent decisions for diagnostics.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decision::{Status, ValidationResult};
use crate::report::ReportId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub report_id: ReportId,
    pub status: Status,
    pub final_score: f64,
    // short fingerprint for quick diagnosis
    pub layer_scores: [f64; 4],
    pub defaulted: Vec<&'static str>,
}

#[derive(Debug)]
pub struct History {
    inner: Mutex<Vec<HistoryEntry>>,
    cap: usize,
}

impl History {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, r: &ValidationResult) {
        let entry = HistoryEntry {
            at: Utc::now(),
            report_id: r.report_id,
            status: r.status,
            final_score: r.final_score,
            layer_scores: r.layer_scores.as_array(),
            defaulted: r.defaulted.iter().map(|d| d.signal.as_str()).collect(),
        };

        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let v = self.inner.lock().expect("history mutex poisoned");
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("history mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
