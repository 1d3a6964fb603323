// SPDX-License-Identifier: AGPL-3.0
// Lingua Sync Core - HTTP transport for the Crowdin REST API
//
// One long-lived client bound to an API base URL, plus a standalone
// download helper for export URLs that live on a different content host.

use crate::types::AppError;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const GENERIC_ERROR: &str = "JSON request error";

struct Binding {
    base_url: String,
    bearer: Option<String>,
}

/// HTTP transport bound to an API base URL, optionally carrying a bearer
/// token. The binding can be replaced at runtime when a token maps the
/// user to a different tenant host.
pub struct ApiTransport {
    http_client: Client,
    binding: RwLock<Binding>,
}

impl ApiTransport {
    pub fn new(base_url: &str) -> Self {
        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            binding: RwLock::new(Binding {
                base_url: base_url.trim_end_matches('/').to_string(),
                bearer: None,
            }),
        }
    }

    /// Rebind to a new API base, replacing the bearer token
    pub fn rebind(&self, base_url: &str, bearer: Option<String>) {
        let mut binding = self.binding.write().unwrap();
        binding.base_url = base_url.trim_end_matches('/').to_string();
        binding.bearer = bearer;
    }

    /// Drop the Authorization header from subsequent requests
    pub fn clear_authorization(&self) {
        self.binding.write().unwrap().bearer = None;
    }

    /// The API base currently in effect
    pub fn base_url(&self) -> String {
        self.binding.read().unwrap().base_url.clone()
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let (url, bearer) = {
            let binding = self.binding.read().unwrap();
            (
                format!("{}/{}", binding.base_url, path.trim_start_matches('/')),
                binding.bearer.clone(),
            )
        };

        let mut request = self.http_client.request(method, &url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request
    }

    /// GET a JSON document from `path` under the API base
    pub async fn get_json(&self, path: &str) -> Result<Value, AppError> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Request failed: {}", e)))?;

        Self::read_json(response).await
    }

    /// POST a JSON body to `path` under the API base
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, AppError> {
        let response = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Request failed: {}", e)))?;

        Self::read_json(response).await
    }

    /// POST a raw octet-stream body with extra request headers
    pub async fn post_octet_stream(
        &self,
        path: &str,
        body: Vec<u8>,
        headers: &[(&str, String)],
    ) -> Result<Value, AppError> {
        let mut request = self
            .request(Method::POST, path)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body);

        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Request failed: {}", e)))?;

        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, AppError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = extract_error_message(&body);
            if status == StatusCode::UNAUTHORIZED {
                return Err(AppError::NotAuthorized(message));
            }
            return Err(AppError::Api(format!(
                "{} (HTTP {})",
                message,
                status.as_u16()
            )));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::Serialization(format!("Invalid JSON response: {}", e)))
    }
}

/// Download `url` into `output_file`, streaming the body to disk.
///
/// Export URLs point at a content host distinct from the API host, so a
/// throwaway unauthenticated client is created per download. It is owned
/// by this future and outlives the body stream.
pub async fn download(url: &str, output_file: &Path) -> Result<(), AppError> {
    let downloader = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

    let response = downloader
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Network(format!("Download request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::Network(format!(
            "Download failed with status {}",
            response.status()
        )));
    }

    let mut file = tokio::fs::File::create(output_file).await.map_err(|e| {
        AppError::FileIo(format!(
            "Failed to create {}: {}",
            output_file.display(),
            e
        ))
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::Network(format!("Download interrupted: {}", e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::FileIo(format!("Failed to write download: {}", e)))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::FileIo(format!("Failed to write download: {}", e)))?;

    Ok(())
}

/// Extract a human-readable message from a Crowdin error body.
///
/// Crowdin wraps errors in more than one nested shape depending on the
/// endpoint; strategies are tried in order and the first hit wins.
fn extract_error_message(body: &str) -> String {
    let Ok(root) = serde_json::from_str::<Value>(body) else {
        return GENERIC_ERROR.to_string();
    };

    const STRATEGIES: &[fn(&Value) -> Option<String>] =
        &[validation_error_message, plain_error_message];

    for extract in STRATEGIES {
        if let Some(message) = extract(&root) {
            return message;
        }
    }

    GENERIC_ERROR.to_string()
}

// Shape: {"errors": [{"error": {"errors": [{"message": "..."}]}}]}
fn validation_error_message(root: &Value) -> Option<String> {
    root.get("errors")?
        .get(0)?
        .get("error")?
        .get("errors")?
        .get(0)?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

// Shape: {"error": {"message": "..."}}
fn plain_error_message(root: &Value) -> Option<String> {
    root.get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
