//! Per-domain adaptive request throttling.
//!
//! Each domain carries its own delay: a successful fetch shrinks it by
//! `success_factor` (floored at `min_delay_secs`), a failed one grows it by
//! `failure_factor` (capped at `max_delay_secs`). Domains never block each
//! other; the lock is only held to reserve a request slot, never across a
//! sleep.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateState {
    /// Seconds to keep between two requests to the domain.
    pub current_delay: f64,
    pub consecutive_failures: u32,
    #[serde(skip)]
    last_request: Option<Instant>,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Mutex<HashMap<String, RateState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Mutex::new(HashMap::new()),
        }
    }

    fn fresh_state(&self) -> RateState {
        RateState {
            current_delay: self.config.initial_delay_secs,
            consecutive_failures: 0,
            last_request: None,
        }
    }

    /// Suspend until the domain's delay has elapsed since its last request,
    /// then record the request time.
    pub async fn wait(&self, domain: &str) {
        let slot = {
            let mut domains = self.domains.lock().unwrap_or_else(|p| p.into_inner());
            let fresh = self.fresh_state();
            let state = domains.entry(domain.to_string()).or_insert(fresh);
            let now = Instant::now();
            let slot = match state.last_request {
                Some(last) => {
                    let earliest = last + Duration::from_secs_f64(state.current_delay);
                    earliest.max(now)
                }
                None => now,
            };
            state.last_request = Some(slot);
            slot
        };

        if slot > Instant::now() {
            tracing::debug!(domain, wait_ms = (slot - Instant::now()).as_millis() as u64, "rate limited");
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Feed back the outcome of a fetch attempt to `domain`.
    pub fn report(&self, domain: &str, success: bool) {
        let mut domains = self.domains.lock().unwrap_or_else(|p| p.into_inner());
        let fresh = self.fresh_state();
        let state = domains.entry(domain.to_string()).or_insert(fresh);
        if success {
            state.current_delay =
                (state.current_delay * self.config.success_factor).max(self.config.min_delay_secs);
            state.consecutive_failures = 0;
        } else {
            state.current_delay =
                (state.current_delay * self.config.failure_factor).min(self.config.max_delay_secs);
            state.consecutive_failures += 1;
        }
    }

    pub fn current_delay(&self, domain: &str) -> f64 {
        let domains = self.domains.lock().unwrap_or_else(|p| p.into_inner());
        domains
            .get(domain)
            .map(|s| s.current_delay)
            .unwrap_or(self.config.initial_delay_secs)
    }

    /// Sorted copy of every tracked domain's state.
    pub fn snapshot(&self) -> BTreeMap<String, RateState> {
        let domains = self.domains.lock().unwrap_or_else(|p| p.into_inner());
        domains
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn failures_grow_delay_up_to_max() {
        let rl = limiter();
        let mut prev = rl.current_delay("google.com");
        for _ in 0..10 {
            rl.report("google.com", false);
            let d = rl.current_delay("google.com");
            assert!(d >= prev);
            assert!(d <= 10.0);
            prev = d;
        }
        assert_eq!(prev, 10.0);
        assert_eq!(rl.snapshot()["google.com"].consecutive_failures, 10);
    }

    #[test]
    fn successes_shrink_delay_down_to_min() {
        let rl = limiter();
        let mut prev = rl.current_delay("bing.com");
        for _ in 0..10 {
            rl.report("bing.com", true);
            let d = rl.current_delay("bing.com");
            assert!(d <= prev);
            assert!(d >= 0.5);
            prev = d;
        }
        assert_eq!(prev, 0.5);
    }

    #[test]
    fn success_resets_failure_streak() {
        let rl = limiter();
        rl.report("a.com", false);
        rl.report("a.com", false);
        rl.report("a.com", true);
        assert_eq!(rl.snapshot()["a.com"].consecutive_failures, 0);
    }

    #[test]
    fn domains_are_independent() {
        let rl = limiter();
        rl.report("slow.com", false);
        assert_eq!(rl.current_delay("fast.com"), 1.0);
        assert_eq!(rl.current_delay("slow.com"), 1.5);
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_waits_for_delay() {
        let rl = limiter();
        let start = Instant::now();
        rl.wait("example.com").await;
        assert!(start.elapsed() < Duration::from_millis(10));
        rl.wait("example.com").await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        // Other domains are not held back.
        let before = Instant::now();
        rl.wait("other.com").await;
        assert!(before.elapsed() < Duration::from_millis(10));
    }
}
