use actix_web::{middleware, web, App, HttpServer};
use formdb::schema::parse_schema;
use formdb::{FormSchema, SubmissionStore};
use std::sync::Mutex;

mod config;
mod handlers;

use config::ServerConfig;

/// Shared application state. The store sits behind a mutex so a mutation
/// and its file rewrite never interleave with another request.
pub struct AppState {
    pub schema: FormSchema,
    pub store: Mutex<SubmissionStore>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting FormDB server");

    let config = ServerConfig::from_env();

    let schema = match &config.schema_file {
        Some(path) => {
            log::info!("Loading form schema from: {}", path.display());
            parse_schema(path)
        }
        None => FormSchema::builtin(),
    }
    .map_err(|e| {
        log::error!("Failed to load form schema: {e}");
        std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
    })?;
    log::info!("Serving form '{}' with {} fields", schema.title, schema.fields.len());

    log::info!("Opening submissions file: {}", config.data_file.display());
    let store = SubmissionStore::open(&config.data_file);

    let state = web::Data::new(AppState {
        schema,
        store: Mutex::new(store),
    });

    log::info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(handlers::cors())
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
            .default_service(web::to(handlers::fallback))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
