use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::inference::InferenceError;
use crate::inference::preprocess::PreprocessError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image was uploaded")]
    MissingImage,
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },
    #[error("Malformed upload: {0}")]
    Upload(String),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Inference worker unavailable")]
    Blocking,
}

impl ApiError {
    fn summary(&self) -> &'static str {
        match self {
            ApiError::MissingImage => "No image uploaded",
            ApiError::PayloadTooLarge { .. } => "Image is too large",
            ApiError::Upload(_) => "Malformed upload",
            ApiError::Inference(InferenceError::Preprocess(err)) => match err {
                PreprocessError::UnsupportedFormat(_) | PreprocessError::Decode(_) => {
                    "Could not read image"
                }
                PreprocessError::EmptyImage
                | PreprocessError::ChannelCount(_)
                | PreprocessError::Shape(_) => "Unsupported image format",
            },
            ApiError::Inference(_) | ApiError::Blocking => "Analysis failed",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Inference(InferenceError::Preprocess(err)) => match err {
                PreprocessError::UnsupportedFormat(_) | PreprocessError::Decode(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PreprocessError::EmptyImage
                | PreprocessError::ChannelCount(_)
                | PreprocessError::Shape(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            },
            ApiError::Inference(_) | ApiError::Blocking => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal failures keep their details in the log only.
        let detail = if self.status_code().is_server_error() {
            None
        } else {
            Some(self.to_string())
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.summary().to_string(),
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocessing_failures_map_to_client_errors() {
        let decode = ApiError::from(InferenceError::Preprocess(PreprocessError::Decode(
            image::ImageError::IoError(std::io::Error::other("truncated")),
        )));
        assert_eq!(decode.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(decode.summary(), "Could not read image");

        let channels = ApiError::from(InferenceError::Preprocess(PreprocessError::ChannelCount(1)));
        assert_eq!(channels.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(channels.summary(), "Unsupported image format");
    }

    #[test]
    fn engine_failures_are_server_errors_without_detail() {
        let err = ApiError::from(InferenceError::EmptyOutput);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::MissingImage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::PayloadTooLarge { limit: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
