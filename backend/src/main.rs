mod cache;
mod config;
mod detect;
mod error;
mod monitor;
mod routes;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use cache::cache_service::CacheService;
use cache::ttl_cache::TtlCache;
use config::MonitorConfig;
use detect::client::InferenceClient;
use detect::orchestrator::UploadOrchestrator;
use detect::resolver::ResultImageResolver;
use monitor::files::FileCatalog;
use monitor::history::HistoryAggregator;
use monitor::log_status::LogStatusReader;
use monitor::stats::StatsAggregator;
use routes::configure_routes;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = MonitorConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    if let Ok(current_dir) = std::env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }
    log::info!("Results directory: {}", config.detected_json_dir().display());
    log::info!("Images directory: {}", config.detected_images_dir().display());
    log::info!("Logs directory: {}", config.logs_path().display());
    if !config.logs_path().is_dir() {
        log::warn!("Log directory does not exist: {}", config.logs_path().display());
    }

    let json_dir = config.detected_json_dir();
    let images_dir = config.detected_images_dir();

    let cache = Arc::new(TtlCache::new(config.cache_ttl()));
    let log_reader = LogStatusReader::new(
        config.logs_path(),
        config.log_pattern.clone(),
        config.running_marker.clone(),
    );
    let history = HistoryAggregator::new(json_dir.clone(), images_dir.clone());
    let stats = StatsAggregator::new(json_dir.clone(), images_dir.clone());
    let cache_service = CacheService::new(cache, log_reader, history.clone(), stats);
    let catalog = FileCatalog::new(
        images_dir.clone(),
        json_dir,
        (config.thumbnail.max_width, config.thumbnail.max_height),
    );

    let client = InferenceClient::new(config.inference.url.clone(), config.inference_timeout())
        .map_err(|e| {
            log::error!("Failed to build inference client: {}", e);
            std::io::Error::other(e.to_string())
        })?;
    log::info!(
        "Inference service: {} (timeout {}s)",
        client.detect_url(),
        config.inference.timeout_secs
    );
    let orchestrator = web::Data::new(UploadOrchestrator::new(
        config.upload_dir(),
        client,
        ResultImageResolver::new(images_dir),
    ));

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(cache_service.clone()))
            .app_data(web::Data::new(history.clone()))
            .app_data(web::Data::new(catalog.clone()))
            .app_data(orchestrator.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
