use disease_classifier::{config, server, telemetry};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = config::get_configuration()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    telemetry::init_tracing(&settings.log);

    server::run(settings).await
}
