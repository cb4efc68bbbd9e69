pub mod retrieval;

use actix_web::web;

use crate::error::AppError;

/// Malformed or missing JSON bodies answer with the same `{error}` shape as every other failure
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into())
}

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(json_config())
            .configure(retrieval::create_routes),
    );
}
