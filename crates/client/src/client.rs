//! Ingestion backend client.
//!
//! Async HTTP client using `reqwest`. Auth headers are requested from the
//! [`AuthHeaderProvider`] right before each request.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use titanic_protocol::constants::{
    CONFIG_PATH, FOLDERS_PATH, HEALTH_PATH, SPACE_PATH, UPLOAD_PATH, fields,
};
use titanic_protocol::{
    ConfigResponse, ErrorBody, FoldersResponse, HealthResponse, SpaceInfo, UploadResponse,
};

use crate::auth::{AuthError, AuthHeaderProvider};

/// Size of the chunks in-memory bodies are split into.
const MEMORY_CHUNK_SIZE: usize = 64 * 1024;

const OCTET_STREAM: &str = "application/octet-stream";

/// Errors from the ingestion client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {}", .error.as_deref().unwrap_or("no details"))]
    Api { status: u16, error: Option<String> },

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the request never got a response from the server.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            Self::Auth(AuthError::RefreshUnreachable(_)) => true,
            _ => false,
        }
    }
}

/// Where the bytes of an upload come from.
#[derive(Debug, Clone)]
pub enum UploadBody {
    Path(PathBuf),
    Bytes(Bytes),
}

/// A file to send to `/upload`.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    /// Empty means `application/octet-stream`.
    pub mime: String,
    pub size: u64,
    pub body: UploadBody,
}

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Ingestion backend client.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn AuthHeaderProvider>,
}

impl Client {
    /// Creates a client for `base_url` (no trailing slash needed).
    pub fn new(base_url: &str, auth: Arc<dyn AuthHeaderProvider>) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs an authenticated GET request and decodes the JSON body.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let headers = self.auth.headers().await?.to_header_map()?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");

        let resp = self.http.get(&url).headers(headers).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                error: ErrorBody::parse(&body),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// Succeeds when the server answers `/health` with a 2xx.
    ///
    /// The body is decoded when it has the expected shape; a bare 2xx still
    /// counts as healthy.
    pub async fn health(&self) -> Result<Option<HealthResponse>, Error> {
        let headers = self.auth.headers().await?.to_header_map()?;
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        let resp = self.http.get(&url).headers(headers).send().await?;
        let status = resp.status();
        let body = resp.bytes().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                error: ErrorBody::parse(&body),
            });
        }
        Ok(serde_json::from_slice(&body).ok())
    }

    /// Returns storage totals in bytes.
    pub async fn space(&self) -> Result<SpaceInfo, Error> {
        self.get(SPACE_PATH).await
    }

    /// Returns the ordered list of destination folders.
    pub async fn folders(&self) -> Result<Vec<String>, Error> {
        let resp: FoldersResponse = self.get(FOLDERS_PATH).await?;
        Ok(resp.folders)
    }

    /// Returns the server's default folder, `None` when unset.
    pub async fn default_folder(&self) -> Result<Option<String>, Error> {
        let resp: ConfigResponse = self.get(CONFIG_PATH).await?;
        Ok(resp.default_folder)
    }

    /// Uploads one file as multipart form data.
    ///
    /// `on_progress(sent, total)` fires each time a chunk is handed to the
    /// transport. Returns the parsed response body, or `None` when a 2xx
    /// reply carries no JSON.
    pub async fn upload<F>(
        &self,
        file: UploadFile,
        compress: bool,
        folder: &str,
        on_progress: F,
    ) -> Result<Option<UploadResponse>, Error>
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        let headers = self.auth.headers().await?.to_header_map()?;

        let total = file.size;
        let source: ByteStream = match file.body {
            UploadBody::Path(path) => {
                let handle = tokio::fs::File::open(&path).await?;
                Box::pin(ReaderStream::new(handle))
            }
            UploadBody::Bytes(data) => {
                Box::pin(stream::iter(chunk_bytes(data).map(Ok::<_, io::Error>)))
            }
        };

        let mut sent = 0u64;
        let counted = source.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                on_progress(sent, total);
            }
            chunk
        });

        let mime = if file.mime.is_empty() {
            OCTET_STREAM
        } else {
            file.mime.as_str()
        };
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(counted), total)
            .file_name(file.name.clone())
            .mime_str(mime)?;

        let mut form = Form::new()
            .part(fields::FILE, part)
            .text(fields::SHOULD_COMPRESS, compress.to_string());
        if !folder.is_empty() {
            form = form.text(fields::FOLDER, folder.to_string());
        }

        let url = format!("{}{}", self.base_url, UPLOAD_PATH);
        debug!(file = %file.name, total, compress, folder, "uploading");
        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                error: ErrorBody::parse(&body),
            });
        }

        let parsed = serde_json::from_slice::<UploadResponse>(&body).ok();
        info!(file = %file.name, status = status.as_u16(), "upload accepted");
        Ok(parsed)
    }
}

fn chunk_bytes(data: Bytes) -> impl Iterator<Item = Bytes> + Send + Sync {
    let len = data.len();
    (0..len)
        .step_by(MEMORY_CHUNK_SIZE)
        .map(move |start| data.slice(start..(start + MEMORY_CHUNK_SIZE).min(len)))
}
