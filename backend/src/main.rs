mod config;
mod error;
mod inference;
mod presenter;
mod routes;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use config::AppConfig;
use inference::{InferenceRunner, LabelSet, Preprocessor, TorchClassifier};
use routes::{UploadLimits, configure_routes};
use std::env;
use std::sync::Arc;

fn startup_error<E: std::fmt::Display>(context: &str, e: E) -> std::io::Error {
    log::error!("{}: {}", context, e);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let (config, source) =
        AppConfig::load().map_err(|e| startup_error("Invalid configuration", e))?;
    match &source {
        Some(path) => log::info!("Loaded configuration from {}", path.display()),
        None => log::warn!("No configuration file found, using defaults"),
    }

    let labels =
        LabelSet::new(&config.labels).map_err(|e| startup_error("Invalid class labels", e))?;
    log::info!("Configured {} classes", labels.len());

    let classifier = TorchClassifier::load(&config.model.path, config.model.device)
        .map_err(|e| startup_error("Model loading failed", e))?;

    let runner = InferenceRunner::new(
        Arc::new(classifier),
        Arc::new(labels),
        Arc::new(Preprocessor::new(&config.preprocessing)),
    );
    runner
        .warm_up()
        .map_err(|e| startup_error("Model does not match the configured classes", e))?;

    let runner = web::Data::new(runner);
    let limits = web::Data::new(UploadLimits {
        max_bytes: config.server.max_upload_bytes,
    });
    let frontend_dir = config.server.resolved_frontend_dir();
    let bind_address = config.server.bind_address();

    log::info!("Serving frontend from {}", frontend_dir);
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
            .app_data(runner.clone())
            .app_data(limits.clone())
            .configure(|cfg| configure_routes(cfg, Some(frontend_dir.clone())))
    })
    .bind(&bind_address)?
    .run()
    .await
}
