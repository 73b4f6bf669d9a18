use actix_web::web;
use log::{debug, info};
use shared::{LogLines, LogSnapshot, StatsSnapshot, TaskHistory};
use std::sync::Arc;

use crate::cache::models::{
    CURRENT_TASK_KEY, CachedPayload, SYSTEM_STATS_KEY, TASK_HISTORY_KEY, logs_key,
};
use crate::cache::ttl_cache::TtlCache;
use crate::error::ApiError;
use crate::monitor::history::HistoryAggregator;
use crate::monitor::log_status::LogStatusReader;
use crate::monitor::stats::StatsAggregator;

/// Read-through cache in front of the filesystem aggregators. Scans run on
/// the blocking pool.
#[derive(Clone)]
pub struct CacheService {
    cache: Arc<TtlCache<CachedPayload>>,
    log_reader: LogStatusReader,
    history: HistoryAggregator,
    stats: StatsAggregator,
}

impl CacheService {
    pub fn new(
        cache: Arc<TtlCache<CachedPayload>>,
        log_reader: LogStatusReader,
        history: HistoryAggregator,
        stats: StatsAggregator,
    ) -> Self {
        Self {
            cache,
            log_reader,
            history,
            stats,
        }
    }

    fn cached<T>(&self, key: &str, extract: fn(CachedPayload) -> Option<T>) -> Option<T> {
        self.cache.get(key).and_then(extract)
    }

    pub async fn current_task(&self) -> Result<LogSnapshot, ApiError> {
        if let Some(snapshot) = self.cached(CURRENT_TASK_KEY, CachedPayload::into_current_task) {
            return Ok(snapshot);
        }

        let reader = self.log_reader.clone();
        let snapshot = web::block(move || reader.current_status()).await??;
        debug!("System status is {}", snapshot.status);
        self.cache
            .set(CURRENT_TASK_KEY, CachedPayload::CurrentTask(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn task_history(&self) -> Result<TaskHistory, ApiError> {
        if let Some(history) = self.cached(TASK_HISTORY_KEY, CachedPayload::into_history) {
            return Ok(history);
        }

        let aggregator = self.history.clone();
        let history = web::block(move || aggregator.list_history()).await??;
        self.cache
            .set(TASK_HISTORY_KEY, CachedPayload::History(history.clone()));
        Ok(history)
    }

    pub async fn system_stats(&self) -> Result<StatsSnapshot, ApiError> {
        if let Some(stats) = self.cached(SYSTEM_STATS_KEY, CachedPayload::into_stats) {
            return Ok(stats);
        }

        let status = self.current_task().await?.status;
        let aggregator = self.stats.clone();
        let stats = web::block(move || aggregator.current_stats(status)).await??;
        self.cache
            .set(SYSTEM_STATS_KEY, CachedPayload::Stats(stats.clone()));
        Ok(stats)
    }

    pub async fn system_logs(&self, limit: usize, force: bool) -> Result<LogLines, ApiError> {
        let key = logs_key(limit);
        if force {
            self.cache.invalidate(&key);
        }
        if let Some(logs) = self.cached(&key, CachedPayload::into_logs) {
            return Ok(logs);
        }

        let reader = self.log_reader.clone();
        let logs = LogLines {
            logs: web::block(move || reader.tail(limit)).await??,
        };
        self.cache.set(key, CachedPayload::Logs(logs.clone()));
        Ok(logs)
    }

    pub fn clear(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        info!("Cache cleared ({} entries)", dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ttl_cache::ManualClock;
    use shared::SystemStatus;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const MARKER: &str = "定时任务开始";

    struct Fixture {
        root: TempDir,
        clock: Arc<ManualClock>,
        service: CacheService,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let json_dir = root.path().join("json");
            let images_dir = root.path().join("images");
            let logs_dir = root.path().join("logs");
            for dir in [&json_dir, &images_dir, &logs_dir] {
                fs::create_dir_all(dir).unwrap();
            }
            let clock = Arc::new(ManualClock::new());
            let cache = Arc::new(TtlCache::with_clock(Duration::from_secs(60), clock.clone()));
            let service = CacheService::new(
                cache,
                LogStatusReader::new(logs_dir, "*.log".to_string(), MARKER.to_string()),
                HistoryAggregator::new(json_dir.clone(), images_dir.clone()),
                StatsAggregator::new(json_dir, images_dir),
            );
            Self {
                root,
                clock,
                service,
            }
        }

        fn path(&self, rel: &str) -> std::path::PathBuf {
            self.root.path().join(rel)
        }
    }

    fn write(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
    }

    #[actix_web::test]
    async fn history_is_served_from_cache_until_ttl() {
        let fx = Fixture::new();
        write(&fx.path("json/detect_result_20240101_080000.json"), "{}");
        assert_eq!(fx.service.task_history().await.unwrap().tasks.len(), 1);

        write(&fx.path("json/detect_result_20240102_080000.json"), "{}");
        assert_eq!(fx.service.task_history().await.unwrap().tasks.len(), 1);

        fx.clock.advance(Duration::from_secs(60));
        assert_eq!(fx.service.task_history().await.unwrap().tasks.len(), 2);
    }

    #[actix_web::test]
    async fn clear_forces_recomputation() {
        let fx = Fixture::new();
        assert_eq!(fx.service.system_stats().await.unwrap().total_tasks, 0);

        write(&fx.path("json/a.json"), "{}");
        assert_eq!(fx.service.system_stats().await.unwrap().total_tasks, 0);

        fx.service.clear();
        assert_eq!(fx.service.system_stats().await.unwrap().total_tasks, 1);
    }

    #[actix_web::test]
    async fn stats_report_log_status() {
        let fx = Fixture::new();
        write(&fx.path("logs/run.log"), &format!("INFO {}\n", MARKER));
        let stats = fx.service.system_stats().await.unwrap();
        assert_eq!(stats.system_status, SystemStatus::Running);
        assert_eq!(
            fx.service.current_task().await.unwrap().status,
            SystemStatus::Running
        );
    }

    #[actix_web::test]
    async fn forced_logs_bypass_the_cache() {
        let fx = Fixture::new();
        write(&fx.path("logs/run.log"), "first\n");
        assert_eq!(fx.service.system_logs(100, false).await.unwrap().logs, vec!["first"]);

        write(&fx.path("logs/run.log"), "first\nsecond\n");
        assert_eq!(fx.service.system_logs(100, false).await.unwrap().logs, vec!["first"]);
        assert_eq!(
            fx.service.system_logs(100, true).await.unwrap().logs,
            vec!["first", "second"]
        );
    }

    #[actix_web::test]
    async fn undecodable_log_fails_only_the_status_read() {
        let fx = Fixture::new();
        fs::write(fx.path("logs/run.log"), [0xFFu8, 0xFE, 0xFF]).unwrap();
        assert!(matches!(
            fx.service.current_task().await,
            Err(ApiError::Encoding(_))
        ));
        assert!(fx.service.task_history().await.is_ok());
    }
}
