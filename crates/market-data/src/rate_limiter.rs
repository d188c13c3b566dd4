use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

fn window_len() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: DateTime<Utc>,
    count: u32,
}

/// Per-provider hourly request limiter.
///
/// Each provider gets its own fixed one-hour window starting at its first
/// recorded request; once the window has elapsed the next request starts
/// a fresh one. A limit of `f64::INFINITY` disables limiting entirely.
/// Not internally synchronized; the owning service holds the mutex.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: HashMap<String, Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn active_window(&self, provider: &str) -> Option<Window> {
        self.windows
            .get(provider)
            .copied()
            .filter(|w| Utc::now() < w.start + window_len())
    }

    /// Whether a request to `provider` is allowed under `rate_limit`
    /// requests per hour.
    pub fn can_request(&self, provider: &str, rate_limit: f64) -> bool {
        if rate_limit.is_infinite() {
            return true;
        }
        match self.active_window(provider) {
            None => true,
            Some(w) => (w.count as f64) < rate_limit,
        }
    }

    /// Record one request, starting a new window if none is active.
    pub fn record_request(&mut self, provider: &str) {
        let now = Utc::now();
        let entry = self.windows.entry(provider.to_string()).or_insert(Window {
            start: now,
            count: 0,
        });
        if now >= entry.start + window_len() {
            entry.start = now;
            entry.count = 0;
        }
        entry.count += 1;
    }

    /// Requests made in the active window.
    pub fn get_request_count(&self, provider: &str) -> u32 {
        self.active_window(provider).map_or(0, |w| w.count)
    }

    /// Requests left in the active window, clamped at zero.
    /// `f64::INFINITY` for unlimited providers.
    pub fn get_remaining(&self, provider: &str, rate_limit: f64) -> f64 {
        if rate_limit.is_infinite() {
            return f64::INFINITY;
        }
        (rate_limit - self.get_request_count(provider) as f64).max(0.0)
    }

    pub fn is_rate_limited(&self, provider: &str, rate_limit: f64) -> bool {
        !self.can_request(provider, rate_limit)
    }

    /// When the active window resets, if one exists.
    pub fn get_reset_time(&self, provider: &str) -> Option<DateTime<Utc>> {
        self.active_window(provider).map(|w| w.start + window_len())
    }

    pub fn get_window_start(&self, provider: &str) -> Option<DateTime<Utc>> {
        self.active_window(provider).map(|w| w.start)
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }

    pub fn clear_provider(&mut self, provider: &str) {
        self.windows.remove(provider);
    }

    /// Force a provider's window into the past (test hook).
    #[cfg(test)]
    pub(crate) fn expire_window(&mut self, provider: &str) {
        if let Some(w) = self.windows.get_mut(provider) {
            w.start = Utc::now() - window_len() - Duration::seconds(1);
        }
    }
}
