use log::debug;
use serde_json::Value;
use std::path::PathBuf;

use crate::monitor::fs_scan;

/// Field the inference service uses for the rendered result image.
pub const FINAL_RESULT_PATH_KEY: &str = "最终检测结果路径";
/// Fragment shared by every result-path field name seen in responses.
pub const RESULT_PATH_FRAGMENT: &str = "检测结果路径";

/// One way of pulling a result image path out of an inference response.
pub trait ResultPathStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, response: &Value) -> Option<String>;
}

pub struct TopLevelFinalPath;

impl ResultPathStrategy for TopLevelFinalPath {
    fn name(&self) -> &'static str {
        "top-level final path"
    }

    fn extract(&self, response: &Value) -> Option<String> {
        non_empty_str(response.get(FINAL_RESULT_PATH_KEY)?)
    }
}

pub struct NestedDataFinalPath;

impl ResultPathStrategy for NestedDataFinalPath {
    fn name(&self) -> &'static str {
        "data.final path"
    }

    fn extract(&self, response: &Value) -> Option<String> {
        let data = response.get("data")?.as_object()?;
        non_empty_str(data.get(FINAL_RESULT_PATH_KEY)?)
    }
}

/// First top-level key containing the fragment whose value is a string.
pub struct KeyContainsResultPath;

impl ResultPathStrategy for KeyContainsResultPath {
    fn name(&self) -> &'static str {
        "key containing result path"
    }

    fn extract(&self, response: &Value) -> Option<String> {
        let value = response
            .as_object()?
            .iter()
            .find(|(key, value)| key.contains(RESULT_PATH_FRAGMENT) && value.is_string())
            .map(|(_, value)| value)?;
        non_empty_str(value)
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

/// File name component of a path reported by the inference service, which may
/// use either separator.
pub fn remote_file_name(path: &str) -> Option<&str> {
    path.rsplit(['/', '\\']).next().filter(|name| !name.is_empty())
}

pub struct ResultImageResolver {
    images_dir: PathBuf,
    strategies: Vec<Box<dyn ResultPathStrategy>>,
}

impl ResultImageResolver {
    pub fn new(images_dir: PathBuf) -> Self {
        Self::with_strategies(
            images_dir,
            vec![
                Box::new(TopLevelFinalPath),
                Box::new(NestedDataFinalPath),
                Box::new(KeyContainsResultPath),
            ],
        )
    }

    pub fn with_strategies(
        images_dir: PathBuf,
        strategies: Vec<Box<dyn ResultPathStrategy>>,
    ) -> Self {
        Self {
            images_dir,
            strategies,
        }
    }

    /// Tries each strategy in order and keeps the first file name that exists
    /// in the results directory. If none does, the response is ignored and
    /// the newest PNG on disk is used.
    pub fn resolve(&self, response: &Value) -> Option<String> {
        for strategy in &self.strategies {
            let Some(path) = strategy.extract(response) else {
                continue;
            };
            let Some(name) = remote_file_name(&path) else {
                continue;
            };
            if self.images_dir.join(name).is_file() {
                debug!("Resolved result image {} via {}", name, strategy.name());
                return Some(name.to_string());
            }
            debug!("{} named {}, which is not on disk", strategy.name(), name);
        }
        self.newest_png()
    }

    fn newest_png(&self) -> Option<String> {
        let pngs = fs_scan::matching_files(&self.images_dir, "*.png").ok()?;
        let newest = fs_scan::newest_by_creation(pngs)?;
        debug!("Falling back to newest result image {}", newest.display());
        Some(fs_scan::file_name_string(&newest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn images(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"").unwrap();
            sleep(Duration::from_millis(20));
        }
        dir
    }

    #[test]
    fn top_level_field_wins() {
        let dir = images(&["img_001.png", "img_002.png"]);
        let resolver = ResultImageResolver::new(dir.path().to_path_buf());
        let response = json!({"最终检测结果路径": "/x/img_001.png"});
        assert_eq!(resolver.resolve(&response).as_deref(), Some("img_001.png"));
    }

    #[test]
    fn nested_data_field_is_second() {
        let dir = images(&["img_001.png", "img_002.png"]);
        let resolver = ResultImageResolver::new(dir.path().to_path_buf());
        let response = json!({"data": {"最终检测结果路径": "D:\\out\\img_001.png"}});
        assert_eq!(resolver.resolve(&response).as_deref(), Some("img_001.png"));
    }

    #[test]
    fn any_result_path_key_is_third() {
        let dir = images(&["change.png", "later.png"]);
        let resolver = ResultImageResolver::new(dir.path().to_path_buf());
        let response = json!({
            "count": 3,
            "变化检测结果路径": "/out/change.png"
        });
        assert_eq!(resolver.resolve(&response).as_deref(), Some("change.png"));
    }

    #[test]
    fn missing_file_moves_on_to_the_next_strategy() {
        let dir = images(&["img_001.png", "img_002.png"]);
        let resolver = ResultImageResolver::new(dir.path().to_path_buf());
        let response = json!({
            "最终检测结果路径": "/x/gone.png",
            "data": {"最终检测结果路径": "/x/img_001.png"}
        });
        assert_eq!(resolver.resolve(&response).as_deref(), Some("img_001.png"));
    }

    #[test]
    fn unrecognised_response_falls_back_to_newest_png() {
        let dir = images(&["img_500.png", "img_999.png", "later.jpg"]);
        let resolver = ResultImageResolver::new(dir.path().to_path_buf());
        let response = json!({"message": "ok"});
        assert_eq!(resolver.resolve(&response).as_deref(), Some("img_999.png"));
    }

    #[test]
    fn nothing_on_disk_resolves_to_none() {
        let dir = images(&[]);
        let resolver = ResultImageResolver::new(dir.path().to_path_buf());
        assert_eq!(resolver.resolve(&json!(["not", "an", "object"])), None);
    }

    #[test]
    fn empty_and_non_string_values_are_ignored() {
        assert_eq!(TopLevelFinalPath.extract(&json!({"最终检测结果路径": ""})), None);
        assert_eq!(NestedDataFinalPath.extract(&json!({"data": "flat"})), None);
        assert_eq!(
            KeyContainsResultPath.extract(&json!({"检测结果路径列表": ["a.png"]})),
            None
        );
    }

    #[test]
    fn remote_file_name_handles_both_separators() {
        assert_eq!(remote_file_name("/x/y/img.png"), Some("img.png"));
        assert_eq!(remote_file_name("C:\\out\\img.png"), Some("img.png"));
        assert_eq!(remote_file_name("img.png"), Some("img.png"));
        assert_eq!(remote_file_name("/x/"), None);
    }
}
