//! Server configuration.

use crate::error::{ServerError, ServerResult};
use arbordb_core::DEFAULT_DOMAIN_PREFIX;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where realm data is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In process memory. Lost on shutdown.
    Memory,
    /// An append-only journal file.
    File {
        /// Journal path.
        data_path: PathBuf,
    },
}

/// An access key created at startup if it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminKeyConfig {
    /// The key string.
    pub key: String,
    /// Realms the key may address.
    #[serde(default)]
    pub realms: Vec<String>,
}

/// Configuration for the ArborDB server.
///
/// The config is usually loaded from a TOML file with [`Self::load`].
///
/// The struct also implements [`Default`] which creates a config suitable for
/// local development and testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// File holding access keys and realm rules. `None` keeps them in memory.
    pub state_path: Option<PathBuf>,
    /// Realm data backend.
    pub storage: StorageConfig,
    /// Sync the journal to disk after every write.
    pub sync_writes: bool,
    /// Prefix of realm domains in the store.
    pub domain_prefix: String,
    /// Origins allowed by CORS. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Request timeout.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Administrative keys ensured at startup.
    pub admin_keys: Vec<AdminKeyConfig>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            state_path: None,
            storage: StorageConfig::Memory,
            sync_writes: false,
            domain_prefix: DEFAULT_DOMAIN_PREFIX.to_string(),
            cors_origins: Vec::new(),
            request_timeout: Duration::from_secs(30),
            admin_keys: Vec::new(),
        }
    }

    /// Load the config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let s = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&s)
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the document is not a valid config.
    pub fn from_toml(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Sets the state file.
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    /// Stores realm data in a journal file.
    pub fn with_file_storage(mut self, data_path: impl Into<PathBuf>) -> Self {
        self.storage = StorageConfig::File {
            data_path: data_path.into(),
        };
        self
    }

    /// Sets whether every journal write is synced.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Sets the domain prefix.
    pub fn with_domain_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.domain_prefix = prefix.into();
        self
    }

    /// Adds an allowed CORS origin.
    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origins.push(origin.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Adds an administrative key.
    pub fn with_admin_key<I, S>(mut self, key: impl Into<String>, realms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_keys.push(AdminKeyConfig {
            key: key.into(),
            realms: realms.into_iter().map(Into::into).collect(),
        });
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        u64::deserialize(de).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.domain_prefix, "arbor");
        assert!(config.admin_keys.is_empty());
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_state_path("state.json")
            .with_file_storage("data/realms.journal")
            .with_sync_writes(true)
            .with_cors_origin("https://app.example")
            .with_admin_key("root", ["chat"]);

        assert_eq!(config.state_path, Some(PathBuf::from("state.json")));
        assert!(matches!(config.storage, StorageConfig::File { .. }));
        assert!(config.sync_writes);
        assert_eq!(config.cors_origins, vec!["https://app.example"]);
        assert_eq!(config.admin_keys[0].realms, vec!["chat"]);
    }

    #[test]
    fn parse_toml() {
        let config = ServerConfig::from_toml(
            r#"
            bind_addr = "0.0.0.0:7000"
            state_path = "/var/lib/arbordb/state.json"
            domain_prefix = "om"
            cors_origins = ["https://a.example"]
            request_timeout = 5

            [storage]
            kind = "file"
            data_path = "/var/lib/arbordb/realms.journal"

            [[admin_keys]]
            key = "root"
            realms = ["chat", "notes"]
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.domain_prefix, "om");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.storage,
            StorageConfig::File {
                data_path: PathBuf::from("/var/lib/arbordb/realms.journal")
            }
        );
        assert_eq!(config.admin_keys.len(), 1);
        assert!(!config.sync_writes);
    }

    #[test]
    fn empty_toml_is_default() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        assert!(matches!(
            ServerConfig::from_toml("bind_addr = 5"),
            Err(ServerError::Config(_))
        ));
    }
}
