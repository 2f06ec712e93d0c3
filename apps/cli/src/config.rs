//! CLI configuration.
//!
//! Read from `<config dir>/titanic/config.json`, then overridden by
//! environment variables and finally by command-line flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use titanic_client::{AuthHeaderProvider, RefreshingSession, StaticTokens};

const DEFAULT_BASE_URL: &str = "http://localhost:3029";

/// Persisted settings. Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Ingestion backend root URL.
    pub base_url: String,

    /// Short-lived ID token, used as-is when no refresh token is set.
    pub id_token: String,

    /// Long-lived token exchanged for fresh ID tokens.
    pub refresh_token: String,

    /// Web API key for the secure-token endpoint.
    pub api_key: String,

    /// App attestation token sent with every request.
    pub app_check_token: String,

    /// Token exchange endpoint; empty means the hosted one.
    pub token_endpoint: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            id_token: String::new(),
            refresh_token: String::new(),
            api_key: String::new(),
            app_check_token: String::new(),
            token_endpoint: String::new(),
        }
    }
}

impl CliConfig {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads only what is stored on disk, ignoring the environment.
    pub fn load_file() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Reads `path`; a missing file yields defaults, an unparsable one
    /// yields defaults with a warning.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Overrides fields from `TITANIC_*` variables resolved through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 6] = [
            ("TITANIC_BASE_URL", &mut self.base_url),
            ("TITANIC_ID_TOKEN", &mut self.id_token),
            ("TITANIC_REFRESH_TOKEN", &mut self.refresh_token),
            ("TITANIC_API_KEY", &mut self.api_key),
            ("TITANIC_APP_CHECK_TOKEN", &mut self.app_check_token),
            ("TITANIC_TOKEN_ENDPOINT", &mut self.token_endpoint),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    }

    /// Saves to the default location.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_path()?)
    }

    /// Writes pretty JSON readable only by the owner.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        write_private(path, content.as_bytes())?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Picks the session type the configured tokens allow.
    ///
    /// A refresh token plus API key gives a self-renewing session; otherwise
    /// the ID token is used verbatim and an empty one means signed out.
    pub fn auth_provider(&self) -> Arc<dyn AuthHeaderProvider> {
        if !self.refresh_token.is_empty() && !self.api_key.is_empty() {
            let mut session = RefreshingSession::new(
                self.api_key.clone(),
                self.refresh_token.clone(),
                self.app_check_token.clone(),
            );
            if !self.id_token.is_empty() {
                session = session.with_id_token(self.id_token.clone());
            }
            if !self.token_endpoint.is_empty() {
                session = session.with_endpoint(self.token_endpoint.clone());
            }
            return Arc::new(session);
        }
        Arc::new(StaticTokens::new(
            Some(self.id_token.clone()),
            self.app_check_token.clone(),
        ))
    }
}

/// Writes `data` to a file that is never readable by others, even briefly.
///
/// New files are created with mode 0600; an existing file is narrowed to 0600
/// before it is truncated.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        if path.exists() {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(data)
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, data)
    }
}

fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_base_dir()?.join("titanic").join("config.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| anyhow::anyhow!("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
            && !xdg.is_empty()
        {
            return Ok(PathBuf::from(xdg));
        }
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.base_url, "http://localhost:3029");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"id_token":"abc"}"#).unwrap();

        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.id_token, "abc");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(CliConfig::load_from(&path).unwrap(), CliConfig::default());
    }

    #[test]
    fn env_overrides_non_empty_values() {
        let env: HashMap<&str, &str> = [
            ("TITANIC_BASE_URL", "https://ingest.example"),
            ("TITANIC_API_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut config = CliConfig {
            api_key: "from-file".into(),
            ..CliConfig::default()
        };
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.base_url, "https://ingest.example");
        assert_eq!(config.api_key, "from-file");
    }

    #[test]
    fn save_round_trips_with_private_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = CliConfig {
            refresh_token: "r".into(),
            ..CliConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(CliConfig::load_from(&path).unwrap(), config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn save_narrows_an_existing_world_readable_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let config = CliConfig {
            api_key: "k".into(),
            ..CliConfig::default()
        };
        config.save_to(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(CliConfig::load_from(&path).unwrap(), config);
    }

    #[tokio::test]
    async fn token_endpoint_is_used_for_refresh() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let config = CliConfig {
            refresh_token: "r".into(),
            api_key: "k".into(),
            token_endpoint: endpoint,
            ..CliConfig::default()
        };
        let err = config.auth_provider().headers().await.unwrap_err();
        assert!(
            matches!(err, titanic_client::AuthError::RefreshUnreachable(_)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn signed_out_config_has_no_session() {
        let provider = CliConfig::default().auth_provider();
        assert!(provider.headers().await.is_err());
    }

    #[tokio::test]
    async fn static_id_token_is_used() {
        let config = CliConfig {
            id_token: "id".into(),
            app_check_token: "att".into(),
            ..CliConfig::default()
        };
        let headers = config.auth_provider().headers().await.unwrap();
        assert_eq!(headers.id_token, "id");
        assert_eq!(headers.app_check_token, "att");
    }
}
