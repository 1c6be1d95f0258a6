use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{ClassesResponse, HealthResponse};
use uuid::Uuid;

use crate::error::ApiError;
use crate::inference::InferenceRunner;
use crate::presenter;

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, frontend_dir: Option<String>) {
    cfg.service(web::resource("/api/analyze").route(web::post().to(handle_analyze)))
        .service(web::resource("/api/classes").route(web::get().to(get_classes)))
        .service(web::resource("/api/health").route(web::get().to(get_health)));
    if let Some(frontend_dir) = frontend_dir {
        cfg.service(Files::new("/", frontend_dir).index_file("index.html"));
    }
}

async fn handle_analyze(
    runner: web::Data<InferenceRunner>,
    limits: web::Data<UploadLimits>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let image = read_image_field(payload, limits.max_bytes).await.inspect_err(|e| {
        warn!("[{}] Rejected upload: {}", request_id, e);
    })?;
    info!("[{}] Received {} byte image", request_id, image.len());

    let runner = runner.into_inner();
    let outcome = web::block(move || runner.analyze(&image))
        .await
        .map_err(|e| {
            error!("[{}] Blocking pool error: {:?}", request_id, e);
            ApiError::Blocking
        })?;

    match outcome {
        Ok(result) => {
            info!(
                "[{}] Predicted {} ({:.2}%)",
                request_id,
                result.label.as_str(),
                result.confidence
            );
            let response = presenter::present(&result, request_id, chrono::Utc::now());
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            let err = ApiError::from(e);
            if actix_web::ResponseError::status_code(&err).is_server_error() {
                error!("[{}] Analysis failed: {}", request_id, err);
            } else {
                warn!("[{}] Analysis rejected: {}", request_id, err);
            }
            Err(err)
        }
    }
}

/// Returns the first non-empty field of the multipart body.
async fn read_image_field(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, ApiError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?
    {
        let mut image_data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?
        {
            if image_data.len() + chunk.len() > max_bytes {
                return Err(ApiError::PayloadTooLarge { limit: max_bytes });
            }
            image_data.extend_from_slice(&chunk);
        }
        if !image_data.is_empty() {
            return Ok(image_data);
        }
    }
    Err(ApiError::MissingImage)
}

async fn get_classes(runner: web::Data<InferenceRunner>) -> HttpResponse {
    HttpResponse::Ok().json(ClassesResponse {
        classes: presenter::class_infos(runner.labels()),
    })
}

async fn get_health(runner: web::Data<InferenceRunner>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        model: runner.classifier_name().to_string(),
        classes: runner.labels().len(),
    })
}
