use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use lume_confidential_match::config::Settings;
use lume_confidential_match::core::MatchService;
use lume_confidential_match::models::Identity;
use lume_confidential_match::routes::{self, AppState};
use lume_confidential_match::services::{
    ClearEngine, EncryptionEngine, EventLog, EventSink, FanoutSink, JwtVerifier, TracingEventSink,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str, default_format: &str) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| default_level.to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| default_format.to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            // Logging is not configured yet
            eprintln!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
        }
    };

    init_tracing(&settings.logging.level, &settings.logging.format);

    info!("Starting Lume confidential match service...");

    let system = match Identity::parse(&settings.engine.system_identity) {
        Some(identity) => identity,
        None => {
            error!("engine.system_identity must not be empty");
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty system identity"));
        }
    };

    if settings.auth.uses_default_secret() {
        warn!("Using the built-in development JWT secret; set LUME__AUTH__JWT_SECRET");
    }

    let clear_engine = Arc::new(ClearEngine::new());
    let engine: Arc<dyn EncryptionEngine> = clear_engine.clone();
    warn!("Encryption engine: {} - values are NOT confidential", engine.name());

    let event_log = Arc::new(EventLog::new(settings.events.capacity));
    let sink = FanoutSink::new()
        .with(Arc::new(TracingEventSink))
        .with(event_log.clone() as Arc<dyn EventSink>);

    let service = Arc::new(MatchService::new(engine, system.clone(), Arc::new(sink)));

    info!(
        system = %system,
        event_capacity = settings.events.capacity,
        dev_routes = settings.engine.dev_routes,
        "Match service initialized"
    );

    let app_state = AppState {
        service,
        events: event_log,
        auth: Arc::new(JwtVerifier::new(&settings.auth.jwt_secret, settings.auth.issuer.clone())),
        dev_engine: settings.engine.dev_routes.then_some(clear_engine),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(routes::handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(routes::handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(routes::handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
