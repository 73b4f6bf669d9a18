pub mod cache_service;
pub mod models;
pub mod ttl_cache;
