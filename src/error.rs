use crate::models::ErrorResponse;
use actix_multipart::MultipartError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Failures of the model backend, both while loading and while running.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model not found at path: {0}")]
    NotFound(String),

    #[error("Model loading error: {0}")]
    Load(String),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Model output mismatch: expected {expected} scores, got {got}")]
    OutputMismatch { expected: usize, got: usize },
}

/// Request-level failures of `POST /predict`.
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Invalid image file: {0}")]
    InvalidImage(String),

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error("Uploaded file exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Inference timed out")]
    Timeout,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<image::ImageError> for PredictError {
    fn from(err: image::ImageError) -> Self {
        PredictError::InvalidImage(err.to_string())
    }
}

impl From<MultipartError> for PredictError {
    fn from(err: MultipartError) -> Self {
        match err {
            // Not a multipart body at all: nothing was uploaded.
            MultipartError::ContentTypeMissing
            | MultipartError::ContentTypeParse
            | MultipartError::ContentTypeIncompatible
            | MultipartError::BoundaryMissing => PredictError::MissingFile,
            other => PredictError::Multipart(other.to_string()),
        }
    }
}

impl PredictError {
    /// Message sent to the client. Server-side details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            PredictError::Model(_) | PredictError::Internal(_) => "Inference failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingFile
            | PredictError::InvalidImage(_)
            | PredictError::Multipart(_) => StatusCode::BAD_REQUEST,
            PredictError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            PredictError::Model(_) | PredictError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.public_message(),
        })
    }
}
