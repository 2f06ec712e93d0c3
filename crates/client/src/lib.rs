//! Async client for the ingestion backend.
//!
//! Wraps the backend's HTTP contract (health, space, folder metadata and
//! multipart upload) and the per-request auth headers it requires.

pub mod auth;
pub mod client;

#[cfg(test)]
mod testing;

pub use auth::{AuthError, AuthHeaderProvider, AuthHeaders, RefreshingSession, StaticTokens};
pub use client::{Client, Error, UploadBody, UploadFile};
