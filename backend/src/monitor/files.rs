use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};
use log::warn;
use serde_json::Value;
use shared::{ImageFileInfo, JsonFileInfo};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::fs_scan;
use crate::error::ApiError;

/// Read-only view over the pipeline's output directories.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    images_dir: PathBuf,
    json_dir: PathBuf,
    thumbnail_max: (u32, u32),
}

impl FileCatalog {
    pub fn new(images_dir: PathBuf, json_dir: PathBuf, thumbnail_max: (u32, u32)) -> Self {
        Self {
            images_dir,
            json_dir,
            thumbnail_max,
        }
    }

    pub fn list_images(&self) -> std::io::Result<Vec<ImageFileInfo>> {
        let mut images = Vec::new();
        for path in fs_scan::image_files(&self.images_dir)? {
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Failed to stat image {}: {}", path.display(), e);
                    continue;
                }
            };
            images.push(ImageFileInfo {
                filename: fs_scan::file_name_string(&path),
                path: path.display().to_string(),
                size_mb: fs_scan::round2(metadata.len() as f64 / (1024.0 * 1024.0)),
                created_time: fs_scan::to_local(fs_scan::created_time(&metadata)),
                modified_time: fs_scan::to_local(fs_scan::modified_time(&metadata)),
            });
        }
        images.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
        Ok(images)
    }

    pub fn list_json_files(&self) -> std::io::Result<Vec<JsonFileInfo>> {
        let mut files = Vec::new();
        for path in fs_scan::matching_files(&self.json_dir, "*.json")? {
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Failed to stat JSON file {}: {}", path.display(), e);
                    continue;
                }
            };
            files.push(JsonFileInfo {
                filename: fs_scan::file_name_string(&path),
                path: path.display().to_string(),
                size_kb: fs_scan::round2(metadata.len() as f64 / 1024.0),
                created_time: fs_scan::to_local(fs_scan::created_time(&metadata)),
                modified_time: fs_scan::to_local(fs_scan::modified_time(&metadata)),
            });
        }
        files.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
        Ok(files)
    }

    pub fn image_path(&self, filename: &str) -> Result<PathBuf, ApiError> {
        existing_file(&self.images_dir, filename)
            .ok_or_else(|| ApiError::NotFound(format!("Image {} does not exist", filename)))
    }

    /// PNG data URL of the image shrunk to fit the configured box. Images that
    /// already fit are re-encoded at their own size.
    pub fn thumbnail(&self, filename: &str) -> Result<String, ApiError> {
        let path = self.image_path(filename)?;
        let image = image::open(&path)?;

        let (max_width, max_height) = self.thumbnail_max;
        let image = if image.width() > max_width || image.height() > max_height {
            image.thumbnail(max_width, max_height)
        } else {
            image
        };

        // 16-bit and float TIFFs have no PNG encoding
        let image = DynamicImage::ImageRgba8(image.to_rgba8());
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(format!(
            "data:image/png;base64,{}",
            STANDARD.encode(buffer.into_inner())
        ))
    }

    pub fn json_content(&self, filename: &str) -> Result<Value, ApiError> {
        let path = existing_file(&self.json_dir, filename)
            .ok_or_else(|| ApiError::NotFound(format!("File {} does not exist", filename)))?;
        Ok(serde_json::from_slice(&std::fs::read(path)?)?)
    }
}

fn existing_file(dir: &Path, filename: &str) -> Option<PathBuf> {
    fs_scan::join_file_name(dir, filename).filter(|path| path.is_file())
}
