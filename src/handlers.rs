use crate::{
    error::PredictError,
    models::{HealthStatus, LabelsResponse},
    server::AppState,
};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, ResponseError};
use futures_util::StreamExt;
use std::time::Instant;
use uuid::Uuid;

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

#[tracing::instrument(skip(state, payload), fields(request_id = %Uuid::new_v4()))]
pub async fn predict(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, PredictError> {
    let started = Instant::now();
    let outcome = run_prediction(&state, payload).await;

    match &outcome {
        Ok(result) => tracing::info!(
            class = %result.label,
            confidence = result.confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prediction served"
        ),
        Err(e) if e.status_code().is_server_error() => {
            tracing::error!(error = %e, "prediction failed")
        }
        Err(e) => tracing::warn!(error = %e, "prediction rejected"),
    }

    outcome.map(|result| HttpResponse::Ok().json(result))
}

async fn run_prediction(
    state: &AppState,
    mut payload: Multipart,
) -> Result<crate::models::PredictionResult, PredictError> {
    let upload = read_upload(&mut payload, state.max_upload_bytes)
        .await?
        .ok_or(PredictError::MissingFile)?;
    tracing::debug!(bytes = upload.len(), "received upload");

    // Decoding, resizing and inference are CPU bound.
    let pipeline = state.pipeline.clone();
    let job = web::block(move || pipeline.classify(&upload));

    let joined = match state.inference_timeout {
        Some(deadline) => actix_rt::time::timeout(deadline, job)
            .await
            .map_err(|_| PredictError::Timeout)?,
        None => job.await,
    };

    joined.map_err(|e| PredictError::Internal(e.to_string()))?
}

/// Reads the first `file` part that carries a filename into memory. Every
/// other part is drained and ignored. Returns `None` when no file was sent.
async fn read_upload(
    payload: &mut Multipart,
    limit: usize,
) -> Result<Option<Vec<u8>>, PredictError> {
    let mut upload = None;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let disposition = field.content_disposition();
        // A part without a filename is a plain form value, not an upload.
        let wanted = upload.is_none()
            && disposition.is_some_and(|d| {
                d.get_name() == Some(FILE_FIELD) && d.get_filename().is_some()
            });

        let mut buffer = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if !wanted {
                continue;
            }
            if buffer.len() + data.len() > limit {
                return Err(PredictError::PayloadTooLarge { limit });
            }
            buffer.extend_from_slice(&data);
        }

        if wanted {
            upload = Some(buffer);
        }
    }

    Ok(upload)
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthStatus {
        status: "Available".into(),
    })
}

pub async fn labels(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(LabelsResponse {
        labels: state.pipeline.labels().as_slice().to_vec(),
    })
}
