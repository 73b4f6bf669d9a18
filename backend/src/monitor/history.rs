use chrono::NaiveDateTime;
use log::warn;
use serde_json::{Map, Value};
use shared::{SkippedFile, TaskDetail, TaskHistory, TaskRecord, TaskSummary};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::fs_scan;
use crate::error::ApiError;

pub const RESULT_FILE_PREFIX: &str = "detect_result_";
pub const RESULT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const ANOMALY_REGIONS_KEY: &str = "异常区域检测";
const HYDRAULIC_FACILITIES_KEY: &str = "重点水利设施检测";
const LAND_COVER_KEY: &str = "地物分类";
const WATER_BODIES_KEY: &str = "水体自动提取";

#[derive(Debug, thiserror::Error)]
enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("top-level value is not a JSON object")]
    NotAnObject,
}

/// Correlates result JSON files with the images the pipeline rendered for them.
#[derive(Debug, Clone)]
pub struct HistoryAggregator {
    json_dir: PathBuf,
    images_dir: PathBuf,
}

impl HistoryAggregator {
    pub fn new(json_dir: PathBuf, images_dir: PathBuf) -> Self {
        Self {
            json_dir,
            images_dir,
        }
    }

    pub fn result_files(&self) -> std::io::Result<Vec<PathBuf>> {
        fs_scan::matching_files(&self.json_dir, "*.json")
    }

    /// Every parseable result file as a task, newest first. Files that fail to
    /// load are reported in `skipped` instead of aborting the listing.
    pub fn list_history(&self) -> std::io::Result<TaskHistory> {
        let mut records: Vec<(SystemTime, TaskRecord)> = Vec::new();
        let mut skipped = Vec::new();

        for path in self.result_files()? {
            match self.load_record(&path) {
                Ok(entry) => records.push(entry),
                Err(e) => {
                    warn!("Failed to parse task file {}: {}", path.display(), e);
                    skipped.push(SkippedFile {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        records.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(TaskHistory {
            tasks: records.into_iter().map(|(_, record)| record).collect(),
            skipped,
        })
    }

    fn load_record(&self, path: &Path) -> Result<(SystemTime, TaskRecord), RecordError> {
        let created = fs_scan::created_time_of(path)?;
        let data: Value = serde_json::from_slice(&std::fs::read(path)?)?;
        let Value::Object(data) = data else {
            return Err(RecordError::NotAnObject);
        };

        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let token = timestamp_token(&id);
        let timestamp = parse_result_timestamp(&id)
            .unwrap_or_else(|| fs_scan::to_local(created));

        let image_files = fs_scan::image_files_containing(&self.images_dir, &token)?
            .iter()
            .map(|p| p.display().to_string())
            .collect();

        let record = TaskRecord {
            id,
            timestamp,
            status: "completed".to_string(),
            result_path: path.display().to_string(),
            image_files,
            summary: summarize(&data),
        };
        Ok((created, record))
    }

    pub fn task_detail(&self, task_id: &str) -> Result<TaskDetail, ApiError> {
        let path = fs_scan::join_file_name(&self.json_dir, &format!("{}.json", task_id))
            .filter(|p| p.is_file())
            .ok_or_else(|| ApiError::NotFound(format!("Task {} does not exist", task_id)))?;

        let data: Value = serde_json::from_slice(&std::fs::read(&path)?)?;
        Ok(TaskDetail {
            id: task_id.to_string(),
            data,
            result_path: path.display().to_string(),
        })
    }
}

/// The token shared by a result file and its images: the part of the stem
/// after `detect_result_`, or the whole stem for files that don't follow the
/// naming scheme.
pub fn timestamp_token(stem: &str) -> String {
    if stem.contains(RESULT_FILE_PREFIX) {
        stem.replace(RESULT_FILE_PREFIX, "")
    } else {
        stem.to_string()
    }
}

pub fn parse_result_timestamp(stem: &str) -> Option<NaiveDateTime> {
    if !stem.contains(RESULT_FILE_PREFIX) {
        return None;
    }
    NaiveDateTime::parse_from_str(&timestamp_token(stem), RESULT_TIMESTAMP_FORMAT).ok()
}

fn summarize(data: &Map<String, Value>) -> TaskSummary {
    let category = |key: &str| {
        data.get(key)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    };
    TaskSummary {
        anomaly_regions: category(ANOMALY_REGIONS_KEY),
        hydraulic_facilities: category(HYDRAULIC_FACILITIES_KEY),
        land_cover: category(LAND_COVER_KEY),
        water_bodies: category(WATER_BODIES_KEY),
    }
}
