use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::retrieval::chunking::DEFAULT_CHUNK_SIZE;
use crate::retrieval::prompt::{PromptTemplate, CONTEXT_PLACEHOLDER};

/// Collection used when neither `VECTOR_COLLECTION` nor `PINECONE_INDEX` is set
pub const DEFAULT_COLLECTION: &str = "docs";

/// Number of matches fed into the prompt
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub cors_allow_origin: String,

    // Retrieval settings
    pub collection_name: String,
    pub chunk_size: usize,
    pub top_k: usize,
    pub prompt_template: PromptTemplate,

    // Upload settings
    pub max_upload_size_mb: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_allow_origin: "*".to_string(),

            collection_name: DEFAULT_COLLECTION.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            top_k: DEFAULT_TOP_K,
            prompt_template: PromptTemplate::Qa,

            max_upload_size_mb: 25,
        }
    }
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, starting from the defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }

        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.port = port;
        }

        if let Some(origin) = lookup("CORS_ALLOW_ORIGIN") {
            config.cors_allow_origin = origin;
        }

        // VECTOR_COLLECTION wins over the Pinecone-flavoured name
        if let Some(collection) = lookup("VECTOR_COLLECTION").or_else(|| lookup("PINECONE_INDEX")) {
            if collection.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "VECTOR_COLLECTION",
                    message: "collection name must not be empty".to_string(),
                });
            }
            config.collection_name = collection;
        }

        if let Some(chunk_size) = parse_var(&lookup, "CHUNK_SIZE")? {
            config.chunk_size = positive("CHUNK_SIZE", chunk_size)?;
        }

        if let Some(top_k) = parse_var(&lookup, "RAG_TOP_K")? {
            config.top_k = positive("RAG_TOP_K", top_k)?;
        }

        if let Some(template) = lookup("RAG_TEMPLATE").filter(|t| !t.trim().is_empty()) {
            if !template.contains(CONTEXT_PLACEHOLDER) {
                return Err(ConfigError::InvalidValue {
                    key: "RAG_TEMPLATE",
                    message: format!("template must contain {}", CONTEXT_PLACEHOLDER),
                });
            }
            config.prompt_template = PromptTemplate::Custom(template);
        } else if let Some(name) = lookup("RAG_PROMPT_TEMPLATE") {
            config.prompt_template =
                name.parse()
                    .map_err(|message: String| ConfigError::InvalidValue {
                        key: "RAG_PROMPT_TEMPLATE",
                        message,
                    })?;
        }

        if let Some(max_upload) = parse_var(&lookup, "MAX_UPLOAD_SIZE_MB")? {
            config.max_upload_size_mb = positive("MAX_UPLOAD_SIZE_MB", max_upload)?;
        }

        Ok(config)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                message: format!("{:?}: {}", raw, e),
            }),
        None => Ok(None),
    }
}

fn positive(key: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            message: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}
