//! Provider health and priority bookkeeping.
//!
//! Each provider starts at its configured base priority (lower is tried
//! first). Every failure doubles the effective priority and starts a cooldown;
//! a success restores the base priority.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use vidseek_core::traits::ProviderClient;

/// What went wrong on a failed attempt. Only used for counters and logs;
/// every kind decays priority the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Error,
    Empty,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Error => "error",
            FailureKind::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub name: String,
    pub base_priority: u32,
    pub fail_count: u32,
    pub last_fail_time: Option<Instant>,
    pub current_priority: u64,
    /// Lifetime counters, never reset by a success.
    pub timeouts: u64,
    pub failures: u64,
}

impl ProviderStatus {
    pub fn new(name: impl Into<String>, base_priority: u32) -> Self {
        Self {
            name: name.into(),
            base_priority,
            fail_count: 0,
            last_fail_time: None,
            current_priority: u64::from(base_priority),
            timeouts: 0,
            failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.fail_count = 0;
        self.last_fail_time = None;
        self.current_priority = u64::from(self.base_priority);
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        self.record_failure_at(kind, Instant::now());
    }

    pub fn record_failure_at(&mut self, kind: FailureKind, at: Instant) {
        self.fail_count = self.fail_count.saturating_add(1);
        self.last_fail_time = Some(at);
        self.current_priority = decayed_priority(self.base_priority, self.fail_count);
        self.failures += 1;
        if kind == FailureKind::Timeout {
            self.timeouts += 1;
        }
    }

    pub fn should_retry(&self, cooldown: Duration) -> bool {
        self.should_retry_at(cooldown, Instant::now())
    }

    /// Never failed, or the last failure is older than `cooldown`.
    pub fn should_retry_at(&self, cooldown: Duration, now: Instant) -> bool {
        match self.last_fail_time {
            None => true,
            Some(t) => now.saturating_duration_since(t) > cooldown,
        }
    }
}

/// `base * 2^fail_count`, saturating.
pub fn decayed_priority(base: u32, fail_count: u32) -> u64 {
    let factor = 1u64.checked_shl(fail_count).unwrap_or(u64::MAX);
    u64::from(base).saturating_mul(factor)
}

struct Entry {
    client: Arc<dyn ProviderClient>,
    status: Mutex<ProviderStatus>,
}

impl Entry {
    fn status(&self) -> MutexGuard<'_, ProviderStatus> {
        // Status fields are plain values; a poisoned lock still holds a usable state.
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A provider picked for one invocation.
#[derive(Clone)]
pub struct ProviderHandle {
    pub name: String,
    pub client: Arc<dyn ProviderClient>,
}

/// Named providers and their status, built once at startup and shared by
/// every router call. Each entry is locked independently.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: BTreeMap<String, Entry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider under `client.name()`. A later registration under the
    /// same name replaces the earlier one.
    pub fn register(&mut self, client: Arc<dyn ProviderClient>, base_priority: u32) {
        let name = client.name().to_string();
        let status = Mutex::new(ProviderStatus::new(name.clone(), base_priority));
        self.entries.insert(name, Entry { client, status });
    }

    pub fn with_provider(mut self, client: Arc<dyn ProviderClient>, base_priority: u32) -> Self {
        self.register(client, base_priority);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handle(&self, name: &str) -> Option<ProviderHandle> {
        self.entries
            .get(name)
            .map(|e| ProviderHandle { name: name.to_string(), client: Arc::clone(&e.client) })
    }

    /// Providers out of cooldown, by ascending current priority then name.
    pub fn eligible(&self, cooldown: Duration) -> Vec<ProviderHandle> {
        self.eligible_at(cooldown, Instant::now())
    }

    pub fn eligible_at(&self, cooldown: Duration, now: Instant) -> Vec<ProviderHandle> {
        let mut ranked: Vec<(u64, &String, &Entry)> = self
            .entries
            .iter()
            .filter_map(|(name, entry)| {
                let status = entry.status();
                status
                    .should_retry_at(cooldown, now)
                    .then_some((status.current_priority, name, entry))
            })
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        ranked
            .into_iter()
            .map(|(_, name, e)| ProviderHandle { name: name.clone(), client: Arc::clone(&e.client) })
            .collect()
    }

    pub fn record_success(&self, name: &str) {
        if let Some(e) = self.entries.get(name) {
            e.status().record_success();
        }
    }

    pub fn record_failure(&self, name: &str, kind: FailureKind) {
        if let Some(e) = self.entries.get(name) {
            e.status().record_failure(kind);
        }
    }

    pub fn status(&self, name: &str) -> Option<ProviderStatus> {
        self.entries.get(name).map(|e| e.status().clone())
    }

    /// Copy of every status, ordered by name.
    pub fn snapshot(&self) -> Vec<ProviderStatus> {
        self.entries.values().map(|e| e.status().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_doubles_per_failure_and_resets() {
        let mut s = ProviderStatus::new("a", 3);
        for n in 1..=5u32 {
            s.record_failure(FailureKind::Error);
            assert_eq!(s.current_priority, 3 * 2u64.pow(n));
        }
        s.record_success();
        assert_eq!(s.current_priority, 3);
        assert_eq!(s.fail_count, 0);
        assert!(s.last_fail_time.is_none());
        assert_eq!(s.failures, 5, "lifetime counter survives success");
    }

    #[test]
    fn priority_saturates() {
        assert_eq!(decayed_priority(7, 200), u64::MAX);
        assert_eq!(decayed_priority(0, 3), 0);
    }

    #[test]
    fn cooldown_is_strictly_greater() {
        let mut s = ProviderStatus::new("a", 1);
        let t0 = Instant::now();
        s.record_failure_at(FailureKind::Timeout, t0);
        let cd = Duration::from_secs(300);
        assert!(!s.should_retry_at(cd, t0 + Duration::from_secs(300)));
        assert!(s.should_retry_at(cd, t0 + Duration::from_secs(301)));
        assert!(!s.should_retry(cd));
        assert_eq!(s.timeouts, 1);
    }
}
