/// Liveness check.
pub const HEALTH_PATH: &str = "/health";

/// Disk space of the media volume.
pub const SPACE_PATH: &str = "/space";

/// Destination folders available under the media root.
pub const FOLDERS_PATH: &str = "/folders";

/// Server-side defaults (currently only the default folder).
pub const CONFIG_PATH: &str = "/config";

/// Multipart upload endpoint.
pub const UPLOAD_PATH: &str = "/upload";

/// Multipart field names accepted by [`UPLOAD_PATH`].
pub mod fields {
    pub const FILE: &str = "file";
    pub const SHOULD_COMPRESS: &str = "shouldCompress";
    pub const FOLDER: &str = "folder";
}

/// Folder used when the server has no configured default or cannot be reached.
///
/// The backend stores everything under `Clips/` and treats this name as the
/// root of that tree.
pub const FALLBACK_FOLDER: &str = "Clips";
