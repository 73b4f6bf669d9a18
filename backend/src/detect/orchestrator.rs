use chrono::Local;
use log::{debug, error, info};
use shared::DetectionOutcome;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::client::{DetectionRequest, InferenceClient};
use super::resolver::ResultImageResolver;
use crate::error::ApiError;

pub const UPLOAD_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectStage {
    Received,
    Saved,
    Forwarded,
    Resolved,
    Returned,
    Failed,
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub original_filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// A multipart upload as received, before any validation.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub image: Option<UploadedImage>,
    pub categories: Option<String>,
    pub is_change_detection: bool,
    pub is_only_change_detection: bool,
    pub legend_required: bool,
}

impl Default for UploadRequest {
    fn default() -> Self {
        Self {
            image: None,
            categories: None,
            is_change_detection: true,
            is_only_change_detection: false,
            legend_required: false,
        }
    }
}

/// Persists an upload, forwards it to the inference service and works out
/// which result image it produced.
///
/// Upload names have one-second resolution, so two uploads in the same
/// second with the same extension overwrite each other. Failures after the
/// file is saved leave it on disk.
pub struct UploadOrchestrator {
    upload_dir: PathBuf,
    client: InferenceClient,
    resolver: Arc<ResultImageResolver>,
}

impl UploadOrchestrator {
    pub fn new(upload_dir: PathBuf, client: InferenceClient, resolver: ResultImageResolver) -> Self {
        Self {
            upload_dir,
            client,
            resolver: Arc::new(resolver),
        }
    }

    pub async fn upload_and_detect(
        &self,
        request: UploadRequest,
    ) -> Result<DetectionOutcome, ApiError> {
        let mut stage = DetectStage::Received;
        let result = self.run(request, &mut stage).await;
        if let Err(e) = &result {
            error!("Upload and detect failed after {:?}: {}", stage, e);
            stage = DetectStage::Failed;
        }
        debug!("Upload pipeline finished in {:?}", stage);
        result
    }

    async fn run(
        &self,
        request: UploadRequest,
        stage: &mut DetectStage,
    ) -> Result<DetectionOutcome, ApiError> {
        let image = request
            .image
            .filter(|image| !image.bytes.is_empty())
            .ok_or_else(|| ApiError::MalformedInput("No image uploaded".to_string()))?;

        let uploaded_file = upload_file_name(image.original_filename.as_deref());
        let image_path = self.save_upload(&uploaded_file, &image.bytes).await?;
        *stage = DetectStage::Saved;

        let categories = parse_categories(request.categories.as_deref())?;
        let detect_request = DetectionRequest {
            image_to_be_detected_address: image_path.display().to_string(),
            categories,
            is_change_detection: request.is_change_detection,
            is_only_change_detection: request.is_only_change_detection,
            legend_required: request.legend_required,
        };
        info!("Starting detection for {}", uploaded_file);
        info!("Detection parameters: {:?}", detect_request);

        let result_json = self.client.detect(&detect_request).await?;
        *stage = DetectStage::Forwarded;

        let resolver = self.resolver.clone();
        let response = result_json.clone();
        let result_images: Vec<String> =
            actix_web::web::block(move || resolver.resolve(&response))
                .await?
                .into_iter()
                .collect();
        *stage = DetectStage::Resolved;

        let outcome = DetectionOutcome {
            status: "success".to_string(),
            message: "detection completed".to_string(),
            timestamp: Local::now().naive_local(),
            result_json,
            result_images,
            uploaded_file,
        };
        *stage = DetectStage::Returned;
        Ok(outcome)
    }

    async fn save_upload(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ApiError> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = std::path::absolute(self.upload_dir.join(file_name))?;
        tokio::fs::write(&path, bytes).await?;
        debug!("Saved upload to {}", path.display());
        Ok(path)
    }
}

/// `upload_<YYYYMMDD_HHMMSS><ext>`, where `<ext>` keeps the original's leading
/// dot and is empty when the original name has no extension.
pub fn upload_file_name(original_filename: Option<&str>) -> String {
    let extension = original_filename
        .and_then(|name| Path::new(name).extension())
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!(
        "upload_{}{}",
        Local::now().format(UPLOAD_TIMESTAMP_FORMAT),
        extension
    )
}

/// Decodes the JSON-encoded category list, dropping duplicates but keeping
/// first-seen order.
pub fn parse_categories(raw: Option<&str>) -> Result<Vec<String>, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::MalformedInput("categories is required".to_string()))?;
    let parsed: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        ApiError::MalformedInput(format!("categories must be a JSON list of strings: {}", e))
    })?;

    let mut categories: Vec<String> = Vec::with_capacity(parsed.len());
    for category in parsed {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    Ok(categories)
}
