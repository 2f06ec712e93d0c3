//! Adapters bridging the HTTP [`Client`] to the traits required by the
//! `titanic-uploads` crate.
//!
//! The upload core knows nothing about HTTP, so both wrappers translate the
//! client's error type into the core's failure vocabulary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use titanic_client::{AuthError, Client, Error as ClientError, UploadBody, UploadFile};
use titanic_uploads::{
    FileSource, MetadataError, MetadataSource, ProgressSink, TransferExecutor, TransferFailure,
    TransferRequest,
};

/// Maps a client error onto the failure kinds the upload core reports.
///
/// Only a missing or revoked session counts as signed out. A token endpoint
/// that cannot be reached is a network failure like any other.
pub fn classify(err: ClientError) -> TransferFailure {
    match err {
        ClientError::Auth(AuthError::NoSession | AuthError::InvalidToken) => TransferFailure::Auth,
        ClientError::Auth(AuthError::RefreshUnreachable(e)) => TransferFailure::Network(e),
        ClientError::Auth(AuthError::RefreshRejected {
            status: 400 | 401 | 403,
            ..
        }) => TransferFailure::Auth,
        ClientError::Auth(AuthError::RefreshRejected { status, .. }) => TransferFailure::Http {
            status,
            server_message: None,
        },
        ClientError::Auth(AuthError::Refresh(e)) => TransferFailure::Unknown(e),
        ClientError::Api { status, error } => TransferFailure::Http {
            status,
            server_message: error,
        },
        e if e.is_network() => TransferFailure::Network(e.to_string()),
        e => TransferFailure::Unknown(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Transfer adapter
// ---------------------------------------------------------------------------

/// Implements `TransferExecutor` with a multipart POST to `/upload`.
pub struct HttpExecutor {
    client: Arc<Client>,
}

impl HttpExecutor {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

impl TransferExecutor for HttpExecutor {
    fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressSink,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransferFailure>> + Send + '_>> {
        Box::pin(async move {
            let file = request.file;
            let body = match file.source {
                FileSource::Path(path) => UploadBody::Path(path),
                FileSource::Memory(data) => UploadBody::Bytes(data),
            };
            let upload = UploadFile {
                name: file.name,
                mime: file.mime,
                size: file.size,
                body,
            };

            self.client
                .upload(upload, request.compress, &request.folder, move |sent, total| {
                    progress(sent, total)
                })
                .await
                .map(|_| ())
                .map_err(classify)
        })
    }
}

// ---------------------------------------------------------------------------
// Metadata adapter
// ---------------------------------------------------------------------------

/// Implements `MetadataSource` with `/folders` and `/config`.
pub struct HttpMetadata {
    client: Arc<Client>,
}

impl HttpMetadata {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

impl MetadataSource for HttpMetadata {
    fn folders(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, MetadataError>> + Send + '_>> {
        Box::pin(async move {
            self.client
                .folders()
                .await
                .map_err(|e| MetadataError(e.to_string()))
        })
    }

    fn default_folder(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, MetadataError>> + Send + '_>> {
        Box::pin(async move {
            self.client
                .default_folder()
                .await
                .map_err(|e| MetadataError(e.to_string()))
        })
    }
}
