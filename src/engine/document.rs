//! OpenAPI document loading.
//!
//! Fetches the document the mock engine serves and checks that it is
//! recognisably OpenAPI (`openapi` or `swagger` at the root). Schema
//! validation is the engine's business.

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use thiserror::Error;

const HTTP_METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Error type for document loading.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to fetch OpenAPI document '{location}': {source}")]
    Fetch {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read OpenAPI document '{location}': {source}")]
    Read {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI document '{location}': {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("'{location}' is not an OpenAPI document (no 'openapi' or 'swagger' field)")]
    NotOpenApi { location: String },
}

/// Summary of a loaded OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenApiDocument {
    pub location: String,
    pub version: String,
    pub title: Option<String>,
    pub operation_count: usize,
}

/// Load the document at `location`: an `http(s)://` URL, a `file://` URL or
/// a filesystem path.
pub async fn load_document(location: &str) -> Result<OpenApiDocument, DocumentError> {
    let text = if location.starts_with("http://") || location.starts_with("https://") {
        fetch(location).await?
    } else {
        let path = file_path(location);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| DocumentError::Read {
                location: location.to_string(),
                source,
            })?
    };

    parse_document(location, &text)
}

async fn fetch(location: &str) -> Result<String, DocumentError> {
    let to_err = |source| DocumentError::Fetch {
        location: location.to_string(),
        source,
    };

    reqwest::get(location)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(to_err)?
        .text()
        .await
        .map_err(to_err)
}

fn file_path(location: &str) -> PathBuf {
    if location.starts_with("file://") {
        if let Some(path) = url::Url::parse(location)
            .ok()
            .and_then(|u| u.to_file_path().ok())
        {
            return path;
        }
    }
    Path::new(location).to_path_buf()
}

/// Parse YAML or JSON text and summarise it.
pub fn parse_document(location: &str, text: &str) -> Result<OpenApiDocument, DocumentError> {
    let root: Value = serde_yaml::from_str(text).map_err(|source| DocumentError::Parse {
        location: location.to_string(),
        source,
    })?;

    let not_openapi = || DocumentError::NotOpenApi {
        location: location.to_string(),
    };

    let version = root
        .get("openapi")
        .or_else(|| root.get("swagger"))
        .and_then(scalar_to_string)
        .ok_or_else(not_openapi)?;

    let title = root
        .get("info")
        .and_then(|info| info.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let operation_count = root
        .get("paths")
        .and_then(Value::as_mapping)
        .map(|paths| {
            paths
                .values()
                .filter_map(Value::as_mapping)
                .map(|item| {
                    item.keys()
                        .filter_map(Value::as_str)
                        .filter(|k| HTTP_METHODS.contains(k))
                        .count()
                })
                .sum()
        })
        .unwrap_or(0);

    Ok(OpenApiDocument {
        location: location.to_string(),
        version,
        title,
        operation_count,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
