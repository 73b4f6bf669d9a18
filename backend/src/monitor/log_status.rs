use chrono::Local;
use log::{debug, warn};
use shared::{LogSnapshot, SystemStatus};
use std::path::{Path, PathBuf};

use super::fs_scan;

pub const RUNNING_MESSAGE: &str = "inference task is running";
pub const IDLE_MESSAGE: &str = "no active task";

#[derive(Debug, thiserror::Error)]
pub enum LogReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} is neither UTF-8 nor GBK")]
    Encoding(PathBuf),
}

/// Reads the newest log file written by the inference scheduler.
#[derive(Debug, Clone)]
pub struct LogStatusReader {
    logs_dir: PathBuf,
    pattern: String,
    running_marker: String,
}

impl LogStatusReader {
    pub fn new(logs_dir: PathBuf, pattern: String, running_marker: String) -> Self {
        Self {
            logs_dir,
            pattern,
            running_marker,
        }
    }

    pub fn latest_log_file(&self) -> std::io::Result<Option<PathBuf>> {
        let files = fs_scan::matching_files(&self.logs_dir, &self.pattern)?;
        Ok(fs_scan::newest_by_creation(files))
    }

    /// Substring heuristic over one log line. The scheduler writes no
    /// structured state, so this is the whole contract.
    pub fn marks_task_started(&self, line: &str) -> bool {
        line.contains(&self.running_marker)
    }

    pub fn current_status(&self) -> Result<LogSnapshot, LogReadError> {
        let Some(log_file) = self.latest_log_file()? else {
            return Ok(idle_snapshot());
        };

        let lines = read_log_lines(&log_file)?;
        let last_line = lines
            .iter()
            .rev()
            .map(|line| line.trim())
            .find(|line| !line.is_empty());

        match last_line {
            Some(line) if self.marks_task_started(line) => {
                debug!("Task start marker found in {}", log_file.display());
                Ok(LogSnapshot {
                    status: SystemStatus::Running,
                    message: RUNNING_MESSAGE.to_string(),
                    last_update: Local::now().naive_local(),
                    log_file: Some(log_file.display().to_string()),
                })
            }
            _ => Ok(idle_snapshot()),
        }
    }

    /// The last `limit` lines of the newest log, trimmed. `limit == 0` returns
    /// the whole file.
    pub fn tail(&self, limit: usize) -> Result<Vec<String>, LogReadError> {
        if !self.logs_dir.is_dir() {
            warn!("Log directory does not exist: {}", self.logs_dir.display());
            return Ok(Vec::new());
        }
        let Some(log_file) = self.latest_log_file()? else {
            return Ok(Vec::new());
        };
        debug!("Reading log file: {}", log_file.display());

        let lines = read_log_lines(&log_file)?;
        let start = if limit == 0 {
            0
        } else {
            lines.len().saturating_sub(limit)
        };
        Ok(lines[start..]
            .iter()
            .map(|line| line.trim().to_string())
            .collect())
    }
}

fn idle_snapshot() -> LogSnapshot {
    LogSnapshot {
        status: SystemStatus::Idle,
        message: IDLE_MESSAGE.to_string(),
        last_update: Local::now().naive_local(),
        log_file: None,
    }
}

/// Decodes a log file as UTF-8, falling back to GBK for logs written by the
/// legacy Windows scheduler.
pub fn read_log_lines(path: &Path) -> Result<Vec<String>, LogReadError> {
    let bytes = std::fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let bytes = err.into_bytes();
            encoding_rs::GBK
                .decode_without_bom_handling_and_without_replacement(&bytes)
                .map(|text| text.into_owned())
                .ok_or_else(|| LogReadError::Encoding(path.to_path_buf()))?
        }
    };
    Ok(text.lines().map(str::to_string).collect())
}
