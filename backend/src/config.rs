use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid inference url: {0}")]
    InferenceUrl(#[from] url::ParseError),
    #[error("Invalid port: {0}")]
    Port(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub project_root: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub log_pattern: String,
    pub running_marker: String,
    pub cache_ttl_secs: u64,
    pub inference: InferenceConfig,
    pub thumbnail: ThumbnailConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub max_width: u32,
    pub max_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
            log_pattern: "*.log".to_string(),
            running_marker: "定时任务开始".to_string(),
            cache_ttl_secs: 60,
            inference: InferenceConfig::default(),
            thumbnail: ThumbnailConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8085/detect/with_data_base_plate".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_width: 400,
            max_height: 300,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8086,
        }
    }
}

impl MonitorConfig {
    /// Loads the YAML file named by `MONITOR_CONFIG` (or the default path when
    /// it exists), then applies the `MONITOR_ROOT`, `MONITOR_HOST` and
    /// `MONITOR_PORT` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("MONITOR_CONFIG").ok().map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        if let Ok(root) = std::env::var("MONITOR_ROOT") {
            config = config.with_root(root);
        }
        if let Ok(host) = std::env::var("MONITOR_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("MONITOR_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::Port(port))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = serde_yaml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.inference.url)?;
        Ok(())
    }

    /// Rebases every relative directory onto `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    fn root(&self) -> PathBuf {
        self.project_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn data_path(&self) -> PathBuf {
        self.root().join(&self.data_dir)
    }

    pub fn logs_path(&self) -> PathBuf {
        self.root().join(&self.logs_dir)
    }

    pub fn detected_images_dir(&self) -> PathBuf {
        self.data_path().join("detected_result_images")
    }

    pub fn detected_json_dir(&self) -> PathBuf {
        self.data_path().join("detected_result_json_files")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.data_path().join("uploaded_images")
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
