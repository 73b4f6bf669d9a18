use shared::{StatsSnapshot, SystemStatus};
use std::path::PathBuf;

use super::fs_scan;

#[derive(Debug, Clone)]
pub struct StatsAggregator {
    json_dir: PathBuf,
    images_dir: PathBuf,
}

impl StatsAggregator {
    pub fn new(json_dir: PathBuf, images_dir: PathBuf) -> Self {
        Self {
            json_dir,
            images_dir,
        }
    }

    /// Counts what is on disk right now. Every result file is a completed
    /// task; there is no failed bucket.
    pub fn current_stats(&self, system_status: SystemStatus) -> std::io::Result<StatsSnapshot> {
        let json_files = fs_scan::matching_files(&self.json_dir, "*.json")?;
        let total_tasks = json_files.len();
        let last_task_time = fs_scan::newest_by_creation(json_files)
            .map(|path| fs_scan::created_time_of(&path))
            .transpose()?
            .map(fs_scan::to_local);
        let total_images = fs_scan::image_files(&self.images_dir)?.len();

        Ok(StatsSnapshot {
            total_tasks,
            completed_tasks: total_tasks,
            total_images,
            last_task_time,
            system_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn counts_results_and_images() {
        let root = TempDir::new().unwrap();
        let json_dir = root.path().join("json");
        let images_dir = root.path().join("images");
        fs::create_dir_all(&json_dir).unwrap();
        fs::create_dir_all(&images_dir).unwrap();
        fs::write(json_dir.join("detect_result_20240101_080000.json"), "{}").unwrap();
        fs::write(json_dir.join("corrupt.json"), "{").unwrap();
        fs::write(json_dir.join("readme.txt"), "").unwrap();
        for name in ["a.png", "b.jpg", "c.jpeg", "d.tif", "e.gif"] {
            fs::write(images_dir.join(name), b"").unwrap();
        }

        let stats = StatsAggregator::new(json_dir, images_dir)
            .current_stats(SystemStatus::Running)
            .unwrap();
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.completed_tasks, 2);
        assert_eq!(stats.total_images, 4);
        assert!(stats.last_task_time.is_some());
        assert_eq!(stats.system_status, SystemStatus::Running);
    }

    #[test]
    fn empty_layout_has_no_last_task() {
        let root = TempDir::new().unwrap();
        let stats = StatsAggregator::new(root.path().join("json"), root.path().join("images"))
            .current_stats(SystemStatus::Idle)
            .unwrap();
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.total_images, 0);
        assert_eq!(stats.last_task_time, None);
    }
}
