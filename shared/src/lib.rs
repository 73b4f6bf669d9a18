use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SystemStatus {
    Running,
    Idle,
}

/// Classification of the inference pipeline derived from its newest log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub status: SystemStatus,
    pub message: String,
    pub last_update: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

/// The four detection categories every result file may carry. Missing
/// categories are reported as empty objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(rename = "异常区域")]
    pub anomaly_regions: Value,
    #[serde(rename = "水利设施")]
    pub hydraulic_facilities: Value,
    #[serde(rename = "地物分类")]
    pub land_cover: Value,
    #[serde(rename = "水体提取")]
    pub water_bodies: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub status: String,
    pub result_path: String,
    pub image_files: Vec<String>,
    pub summary: TaskSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistory {
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub id: String,
    pub data: Value,
    pub result_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_images: usize,
    pub last_task_time: Option<NaiveDateTime>,
    pub system_status: SystemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLines {
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFileInfo {
    pub filename: String,
    pub path: String,
    pub size_mb: f64,
    pub created_time: NaiveDateTime,
    pub modified_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonFileInfo {
    pub filename: String,
    pub path: String,
    pub size_kb: f64,
    pub created_time: NaiveDateTime,
    pub modified_time: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub status: String,
    pub message: String,
    pub timestamp: NaiveDateTime,
    pub result_json: Value,
    pub result_images: Vec<String>,
    pub uploaded_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub message: String,
    pub timestamp: NaiveDateTime,
}
