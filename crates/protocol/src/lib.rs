//! Wire types for the ingestion backend's HTTP contract.
//!
//! Shared by the HTTP client and anything that needs to speak the same
//! JSON shapes (mock servers in tests, for instance).

pub mod constants;
pub mod types;

// Re-export primary types for convenience.
pub use types::{ConfigResponse, ErrorBody, FoldersResponse, HealthResponse, SpaceInfo, UploadResponse};
