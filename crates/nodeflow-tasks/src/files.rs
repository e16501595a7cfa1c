//! Resolving file inputs to bytes.
//!
//! A file input is either a [`FileRef`] or a text value holding a URL or a
//! local path. Bytes come from the filesystem, from an inline `data:` URL,
//! or from an HTTP GET.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::types::{FileRef, Ports, TaskKind, Value};

/// Loaded file content.
#[derive(Debug, Clone)]
pub struct FileData {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FileData {
    pub fn to_data_url(&self) -> String {
        to_data_url(&self.bytes, &self.mime)
    }
}

/// Read a required file input from the node's inputs.
pub fn file_input(kind: TaskKind, inputs: &Ports, name: &str) -> Result<FileRef> {
    match inputs.get(name) {
        Some(Value::File(file)) => Ok(file.clone()),
        Some(Value::Text(text)) if !text.trim().is_empty() => Ok(parse_reference(text.trim())),
        _ => Err(NodeflowError::task_input(
            kind,
            format!("missing required input '{}'", name),
        )),
    }
}

/// Interpret a text reference as a URL or a local path.
pub fn parse_reference(text: &str) -> FileRef {
    if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("data:") {
        FileRef::Url(text.to_string())
    } else {
        FileRef::Path(PathBuf::from(text))
    }
}

/// Fetch the bytes behind a file reference.
pub async fn load(http: &Client, file: &FileRef) -> Result<FileData> {
    let fail = |message: String| NodeflowError::File {
        reference: file.to_string(),
        message,
    };

    match file {
        FileRef::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| fail(e.to_string()))?;
            Ok(FileData {
                name: file.file_name(),
                mime: mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
                bytes,
            })
        }
        FileRef::Url(url) if file.is_data_url() => {
            let (mime, bytes) = decode_data_url(url).ok_or_else(|| fail("malformed data URL".into()))?;
            Ok(FileData {
                name: file.file_name(),
                mime,
                bytes,
            })
        }
        FileRef::Url(url) => {
            let response = http
                .get(url)
                .send()
                .await
                .map_err(|e| fail(e.to_string()))?;
            if !response.status().is_success() {
                return Err(fail(format!("HTTP {}", response.status())));
            }
            let mime = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
                .unwrap_or_else(|| {
                    mime_guess::from_path(file.file_name())
                        .first_or_octet_stream()
                        .essence_str()
                        .to_string()
                });
            let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
            Ok(FileData {
                name: file.file_name(),
                mime,
                bytes: bytes.to_vec(),
            })
        }
    }
}

pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 `data:` URL into its media type and decoded bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}
