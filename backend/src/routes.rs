use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, web};
use chrono::Local;
use futures::{StreamExt, TryStreamExt};
use log::info;
use serde::Deserialize;
use serde_json::json;
use shared::ClearCacheResponse;

use crate::cache::cache_service::CacheService;
use crate::detect::orchestrator::{UploadOrchestrator, UploadRequest, UploadedImage};
use crate::error::ApiError;
use crate::monitor::files::FileCatalog;
use crate::monitor::history::HistoryAggregator;

pub const DEFAULT_LOG_LIMIT: usize = 100;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/tasks/current").route(web::get().to(get_current_task)))
        .service(web::resource("/api/tasks/history").route(web::get().to(get_task_history)))
        .service(web::resource("/api/tasks/{task_id}").route(web::get().to(get_task_detail)))
        .service(web::resource("/api/logs").route(web::get().to(get_system_logs)))
        .service(web::resource("/api/stats").route(web::get().to(get_system_stats)))
        .service(web::resource("/api/images").route(web::get().to(get_detected_images)))
        .service(
            web::resource("/api/images/{filename}/thumbnail")
                .route(web::get().to(get_image_thumbnail)),
        )
        .service(
            web::resource("/api/images/{filename}/download").route(web::get().to(download_image)),
        )
        .service(web::resource("/api/json-files").route(web::get().to(get_json_files)))
        .service(
            web::resource("/api/json-files/{filename}/content")
                .route(web::get().to(get_json_content)),
        )
        .service(web::resource("/api/clear-cache").route(web::get().to(clear_cache)))
        .service(
            web::resource("/api/upload-and-detect").route(web::post().to(upload_and_detect)),
        );
}

async fn get_current_task(cache: web::Data<CacheService>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(cache.current_task().await?))
}

async fn get_task_history(cache: web::Data<CacheService>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(cache.task_history().await?))
}

async fn get_task_detail(
    history: web::Data<HistoryAggregator>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner();
    let history = history.into_inner();
    let detail = web::block(move || history.task_detail(&task_id)).await??;
    Ok(HttpResponse::Ok().json(detail))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
    force: Option<i64>,
}

async fn get_system_logs(
    cache: web::Data<CacheService>,
    query: web::Query<LogsQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let force = query.force.unwrap_or(0) != 0;
    Ok(HttpResponse::Ok().json(cache.system_logs(limit, force).await?))
}

async fn get_system_stats(cache: web::Data<CacheService>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(cache.system_stats().await?))
}

async fn get_detected_images(catalog: web::Data<FileCatalog>) -> Result<HttpResponse, ApiError> {
    let catalog = catalog.into_inner();
    let images = web::block(move || catalog.list_images()).await??;
    Ok(HttpResponse::Ok().json(json!({ "images": images })))
}

async fn get_image_thumbnail(
    catalog: web::Data<FileCatalog>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let filename = path.into_inner();
    let catalog = catalog.into_inner();
    let thumbnail = web::block(move || catalog.thumbnail(&filename)).await??;
    Ok(HttpResponse::Ok().json(json!({ "thumbnail": thumbnail })))
}

async fn download_image(
    catalog: web::Data<FileCatalog>,
    path: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    let filename = path.into_inner();
    let image_path = catalog.image_path(&filename)?;
    let file = NamedFile::open_async(&image_path).await?;
    Ok(file.set_content_disposition(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(filename)],
    }))
}

async fn get_json_files(catalog: web::Data<FileCatalog>) -> Result<HttpResponse, ApiError> {
    let catalog = catalog.into_inner();
    let json_files = web::block(move || catalog.list_json_files()).await??;
    Ok(HttpResponse::Ok().json(json!({ "json_files": json_files })))
}

async fn get_json_content(
    catalog: web::Data<FileCatalog>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let filename = path.into_inner();
    let catalog = catalog.into_inner();
    let content = web::block(move || catalog.json_content(&filename)).await??;
    Ok(HttpResponse::Ok().json(json!({ "content": content })))
}

async fn clear_cache(cache: web::Data<CacheService>) -> HttpResponse {
    cache.clear();
    HttpResponse::Ok().json(ClearCacheResponse {
        message: "cache cleared".to_string(),
        timestamp: Local::now().naive_local(),
    })
}

async fn upload_and_detect(
    orchestrator: web::Data<UploadOrchestrator>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request = read_upload_form(payload).await?;
    info!(
        "Received upload {:?}",
        request.image.as_ref().and_then(|i| i.original_filename.as_deref())
    );
    let outcome = orchestrator.upload_and_detect(request).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

async fn read_upload_form(mut payload: Multipart) -> Result<UploadRequest, ApiError> {
    let mut request = UploadRequest::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::MalformedInput(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let original_filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| ApiError::MalformedInput(format!("Invalid multipart body: {}", e)))?;
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "image" => {
                request.image = Some(UploadedImage {
                    original_filename,
                    bytes: data,
                })
            }
            "categories" => request.categories = Some(form_text(&name, data)?),
            "is_change_detection" => {
                request.is_change_detection = parse_form_bool(&name, &form_text(&name, data)?)?
            }
            "is_only_change_detection" => {
                request.is_only_change_detection =
                    parse_form_bool(&name, &form_text(&name, data)?)?
            }
            "legend_required" => {
                request.legend_required = parse_form_bool(&name, &form_text(&name, data)?)?
            }
            _ => {}
        }
    }

    Ok(request)
}

fn form_text(name: &str, data: Vec<u8>) -> Result<String, ApiError> {
    String::from_utf8(data)
        .map_err(|_| ApiError::MalformedInput(format!("{} must be UTF-8 text", name)))
}

pub fn parse_form_bool(name: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ApiError::MalformedInput(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}
