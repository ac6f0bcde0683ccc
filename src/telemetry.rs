//! Tracing setup, anonymised ids for logs and metric descriptions.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::report::UserId;

pub const DEFAULT_LOG_FILTER: &str = "flood_report_validator=info,warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Short stable hash so user ids never appear in logs.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub fn anon_user(user: UserId) -> String {
    anon_hash(&user.to_string())
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("validations_total", "Completed validations by status.");
        describe_counter!(
            "validation_rejected_total",
            "Reports rejected for out-of-domain input."
        );
        describe_counter!(
            "signal_defaults_total",
            "Collaborator signals replaced by their neutral default."
        );
        describe_counter!("provider_errors_total", "Provider http/parse errors.");
        describe_counter!(
            "aggregator_train_epochs_total",
            "Training epochs run by the weighted aggregator."
        );
        describe_counter!("trust_update_failures_total", "Failed trust feedback updates.");
        describe_histogram!(
            "validation_duration_ms",
            "End-to-end validation time in milliseconds."
        );
        describe_gauge!("report_cache_size", "Entries in the recent report cache.");
        describe_gauge!("validation_threshold", "Configured decision threshold.");
    });
}
