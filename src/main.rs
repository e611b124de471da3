use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::time::Duration;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod leave;
mod model;
mod models;
mod routes;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::utils::policy_cache::{self, PolicyCache};
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Leave planner is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, prefix = %config.api_prefix, "Server starting...");

    let pool = init_db(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to database");
            std::io::Error::other(e)
        })?;

    let Some(limiter) = routes::build_limiter(config.rate_protected_per_min) else {
        error!(rate = config.rate_protected_per_min, "RATE_PROTECTED_PER_MIN must be positive");
        return Err(std::io::Error::other("invalid rate limit"));
    };

    let cache = PolicyCache::new(Duration::from_secs(config.policy_cache_ttl_secs));

    let pool_for_cache_warmup = pool.clone();
    let cache_for_warmup = cache.clone();
    actix_web::rt::spawn(async move {
        // A missing policy is not fatal: it can still be created through PUT /policy
        if let Err(e) = policy_cache::warmup_policy_cache(&cache_for_warmup, &pool_for_cache_warmup).await {
            warn!(error = %e, "Failed to warmup policy cache");
        }
    });

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(cache.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, &config, &limiter))
    })
    .bind(server_addr)?
    .run()
    .await
}
