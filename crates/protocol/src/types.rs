use serde::{Deserialize, Serialize};

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Disk usage of the media volume, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Body of `GET /folders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldersResponse {
    #[serde(default)]
    pub folders: Vec<String>,
}

/// Body of `GET /config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    #[serde(default)]
    pub default_folder: Option<String>,
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub plex_path: String,
    #[serde(default)]
    pub folder: Option<String>,
}

/// Error body returned with any non-2xx status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    /// Extracts the `error` field from a raw response body, if it parses.
    pub fn parse(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .map(|b| b.error)
            .filter(|e| !e.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_null_default_folder() {
        let cfg: ConfigResponse = serde_json::from_str(r#"{"default_folder":null}"#).unwrap();
        assert_eq!(cfg.default_folder, None);

        let cfg: ConfigResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.default_folder, None);
    }

    #[test]
    fn upload_response_without_folder() {
        let json = r#"{"message":"File saved successfully","filename":"a.mp4","plex_path":"/downloads/Clips/a.mp4"}"#;
        let resp: UploadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.filename, "a.mp4");
        assert!(resp.folder.is_none());
    }

    #[test]
    fn error_body_parse() {
        assert_eq!(
            ErrorBody::parse(br#"{"error":"folder not found"}"#).as_deref(),
            Some("folder not found")
        );
        assert_eq!(ErrorBody::parse(b"<html>502</html>"), None);
        assert_eq!(ErrorBody::parse(br#"{"error":"  "}"#), None);
    }

    #[test]
    fn health_timestamp_optional() {
        let h: HealthResponse = serde_json::from_str(r#"{"status":"healthy"}"#).unwrap();
        assert_eq!(h.status, "healthy");
        assert!(h.timestamp.is_none());
    }
}
