use crate::{
    config::{LimitSettings, Settings},
    error::ModelError,
    handlers,
    inference::InferencePipeline,
    model::OnnxClassifier,
};
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::{sync::Arc, time::Duration};

/// Read-only state shared by every worker.
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
    pub max_upload_bytes: usize,
    pub inference_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(pipeline: InferencePipeline, limits: &LimitSettings) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            max_upload_bytes: limits.max_upload_bytes,
            inference_timeout: limits.inference_timeout(),
        }
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").route(web::post().to(handlers::predict)))
        .service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(web::resource("/labels").route(web::get().to(handlers::labels)));
}

pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
}

/// Loads the model and label table. Any failure here means the service
/// must not start.
pub fn build_state(settings: &Settings) -> Result<AppState, ModelError> {
    let labels = settings
        .model
        .label_table()
        .map_err(|e| ModelError::Load(e.to_string()))?;
    let classifier = OnnxClassifier::load(&settings.model.path)?;
    tracing::info!(
        model = %classifier.path().display(),
        classes = labels.len(),
        "classifier ready"
    );
    let pipeline = InferencePipeline::new(Arc::new(classifier), labels);

    if settings.model.warmup {
        pipeline.warmup()?;
        tracing::info!("model warmup succeeded");
    }

    Ok(AppState::new(pipeline, &settings.limits))
}

pub async fn run(settings: Settings) -> std::io::Result<()> {
    let state = build_state(&settings).map_err(|e| {
        tracing::error!(error = %e, "model unavailable, refusing to start");
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;
    let state = web::Data::new(state);

    let address = settings.server.get_address();
    tracing::info!(
        labels = ?state.pipeline.labels().as_slice(),
        max_upload_bytes = state.max_upload_bytes,
        "Server running at http://{}",
        address
    );

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(cors())
            .configure(routes)
    });
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    server.bind(address)?.run().await
}
