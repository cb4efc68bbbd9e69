mod config;
mod error;
mod retrieval;
mod routes;
mod services;

use actix_cors::Cors;
use actix_web::{
    http::header,
    middleware::{Compress, Logger, NormalizePath},
    web, App, HttpResponse, HttpServer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::retrieval::{EmbeddingFactory, GenerationFactory, VectorDBFactory};
use crate::routes::create_routes;
use crate::services::rag::{RAGService, RagSettings};

pub struct AppState {
    pub config: Arc<Config>,
    pub rag: Arc<RAGService>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting doc-chat server");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded (collection: {}, chunk size: {}, top k: {}, template: {})",
        config.collection_name,
        config.chunk_size,
        config.top_k,
        config.prompt_template.name()
    );

    // External clients are created once and shared by every worker
    let embeddings = EmbeddingFactory::from_env()?;
    let vector_db = VectorDBFactory::from_env().await?;
    let generator = GenerationFactory::from_env()?;
    info!(
        "Clients ready (embeddings: {} ({} dims), vector db: {}, generation: {})",
        embeddings.model_name(),
        embeddings.dimension(),
        vector_db.name(),
        generator.model_name()
    );

    let rag = RAGService::new(embeddings, vector_db, generator, RagSettings::from(&config));

    let state = web::Data::new(AppState {
        config: Arc::new(config.clone()),
        rag: Arc::new(rag),
    });

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    let cors_allow_origin = config.cors_allow_origin.clone();

    info!("Server running at http://{}", addr);

    HttpServer::new(move || {
        let cors = if cors_allow_origin == "*" {
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600)
        } else {
            let mut cors = Cors::default();
            for origin in cors_allow_origin.split(',').map(|s| s.trim()) {
                cors = cors.allowed_origin(origin);
            }
            cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
                .max_age(3600)
        };

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .route("/health", web::get().to(health_check))
            .configure(create_routes)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": true }))
}
