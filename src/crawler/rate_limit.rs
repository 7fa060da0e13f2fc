//! Per-host request spacing
//!
//! The arXiv hosts ask for a minimum interval between automated requests.
//! The limiter hands out send slots by keeping a next-allowed instant per
//! host: callers reserve a slot under the lock, then sleep outside it, so
//! concurrent workers queue up in arrival order without serializing their
//! actual fetches. Hosts without a configured interval pass through
//! untouched.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Spaces out requests to hosts with a configured minimum interval
pub struct HostRateLimiter {
    /// Earliest instant the next request may go out, per host
    next_allowed: Mutex<HashMap<String, Instant>>,

    /// Minimum spacing per host; hosts not listed are unthrottled
    intervals: HashMap<String, Duration>,
}

impl HostRateLimiter {
    /// Creates a limiter covering both arXiv hosts with the same interval
    ///
    /// # Arguments
    ///
    /// * `arxiv_min_interval_seconds` - Minimum spacing between requests to
    ///   arxiv.org and export.arxiv.org
    pub fn new(arxiv_min_interval_seconds: f64) -> Self {
        let interval = Duration::from_secs_f64(arxiv_min_interval_seconds.max(0.0));

        let mut intervals = HashMap::new();
        intervals.insert("arxiv.org".to_string(), interval);
        intervals.insert("export.arxiv.org".to_string(), interval);

        Self {
            next_allowed: Mutex::new(HashMap::new()),
            intervals,
        }
    }

    /// Waits until a request to the given host is allowed
    ///
    /// Returns immediately for hosts without a configured interval. For
    /// throttled hosts, each caller is assigned the next free slot; with k
    /// queued callers the last one waits roughly k times the interval.
    pub async fn throttle(&self, host: &str) {
        let interval = match self.intervals.get(host) {
            Some(interval) => *interval,
            None => return,
        };

        let wait = {
            let mut next_allowed = self.next_allowed.lock().unwrap();
            let now = Instant::now();

            let wait = next_allowed
                .get(host)
                .map(|next| next.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO);

            // Reserve this caller's slot before releasing the lock
            next_allowed.insert(host.to_string(), now + wait + interval);
            wait
        };

        if !wait.is_zero() {
            tracing::trace!("Throttling {} for {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
    }
}
