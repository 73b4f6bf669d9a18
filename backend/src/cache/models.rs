use shared::{LogLines, LogSnapshot, StatsSnapshot, TaskHistory};
use std::time::{Duration, Instant};

pub const CURRENT_TASK_KEY: &str = "current_task";
pub const TASK_HISTORY_KEY: &str = "task_history";
pub const SYSTEM_STATS_KEY: &str = "system_stats";

pub fn logs_key(limit: usize) -> String {
    format!("logs_{}", limit)
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, stored_at: Instant) -> Self {
        Self { value, stored_at }
    }

    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Everything the read endpoints keep in the TTL cache.
#[derive(Debug, Clone)]
pub enum CachedPayload {
    CurrentTask(LogSnapshot),
    History(TaskHistory),
    Stats(StatsSnapshot),
    Logs(LogLines),
}

impl CachedPayload {
    pub fn into_current_task(self) -> Option<LogSnapshot> {
        match self {
            CachedPayload::CurrentTask(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn into_history(self) -> Option<TaskHistory> {
        match self {
            CachedPayload::History(history) => Some(history),
            _ => None,
        }
    }

    pub fn into_stats(self) -> Option<StatsSnapshot> {
        match self {
            CachedPayload::Stats(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn into_logs(self) -> Option<LogLines> {
        match self {
            CachedPayload::Logs(logs) => Some(logs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_expires_exactly_at_ttl() {
        let stored_at = Instant::now();
        let entry = CacheEntry::new(1, stored_at);
        let ttl = Duration::from_secs(60);
        assert!(entry.is_fresh(stored_at + Duration::from_secs(59), ttl));
        assert!(!entry.is_fresh(stored_at + ttl, ttl));
    }

    #[test]
    fn logs_key_embeds_limit() {
        assert_eq!(logs_key(100), "logs_100");
    }
}
