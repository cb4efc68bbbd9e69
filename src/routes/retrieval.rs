use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    services::rag::Document,
    AppState,
};

#[derive(Debug, Serialize, Deserialize)]
struct RetrievalConfigResponse {
    #[serde(rename = "VECTOR_DB")]
    vector_db: String,
    #[serde(rename = "COLLECTION_NAME")]
    collection_name: String,
    #[serde(rename = "CHUNK_SIZE")]
    chunk_size: usize,
    #[serde(rename = "TOP_K")]
    top_k: usize,
    #[serde(rename = "RAG_PROMPT_TEMPLATE")]
    prompt_template: String,
    #[serde(rename = "RAG_EMBEDDING_MODEL")]
    embedding_model: String,
    #[serde(rename = "RAG_GENERATION_MODEL")]
    generation_model: String,
    #[serde(rename = "MAX_UPLOAD_SIZE_MB")]
    max_upload_size_mb: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbedResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Deserialize, Validate)]
struct ChatForm {
    #[validate(length(min = 1, message = "Question is required"))]
    question: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatResponse {
    answer: String,
    sources: usize,
}

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/embed", web::post().to(embed_file))
        .route("/chat", web::post().to(chat))
        .route("/config", web::get().to(get_rag_config));
}

async fn get_rag_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let settings = state.rag.settings();

    Ok(HttpResponse::Ok().json(RetrievalConfigResponse {
        vector_db: state.rag.vector_db_name().to_string(),
        collection_name: settings.collection_name.clone(),
        chunk_size: settings.chunk_size,
        top_k: settings.top_k,
        prompt_template: settings.prompt_template.name().to_string(),
        embedding_model: state.rag.embedding_model().to_string(),
        generation_model: state.rag.generation_model().to_string(),
        max_upload_size_mb: state.config.max_upload_size_mb,
    }))
}

// POST /embed - Ingest an uploaded text file
async fn embed_file(state: web::Data<AppState>, mut payload: Multipart) -> AppResult<HttpResponse> {
    let max_bytes = state.config.max_upload_bytes();
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
        let content_disposition = field.content_disposition();
        let field_name = content_disposition
            .and_then(|cd| cd.get_name())
            .unwrap_or("")
            .to_string();

        if field_name != "file" {
            continue;
        }

        filename = content_disposition
            .and_then(|cd| cd.get_filename())
            .map(|s| s.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            if data.len() + chunk.len() > max_bytes {
                return Err(AppError::BadRequest(format!(
                    "File exceeds the {} MB upload limit",
                    state.config.max_upload_size_mb
                )));
            }
            data.extend_from_slice(&chunk);
        }
        file_data = Some(data);
    }

    let file_data = file_data.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let filename = filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("filename is required".to_string()))?;

    let summary = state
        .rag
        .ingest(&Document::new(filename, file_data))
        .await?;

    Ok(HttpResponse::Ok().json(EmbedResponse {
        success: true,
        message: format!(
            "Processed {} chunks from {}",
            summary.chunk_count, summary.filename
        ),
    }))
}

// POST /chat - Answer a question from the ingested documents
async fn chat(state: web::Data<AppState>, form: web::Json<ChatForm>) -> AppResult<HttpResponse> {
    form.validate()?;

    let answer = state.rag.answer(&form.question).await?;

    Ok(HttpResponse::Ok().json(ChatResponse {
        answer: answer.answer,
        sources: answer.sources,
    }))
}
