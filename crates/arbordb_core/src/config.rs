//! Core configuration.

/// Default prefix of realm domains in the key-value store.
pub const DEFAULT_DOMAIN_PREFIX: &str = "arbor";

/// Configuration for the dynamic database service.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Prefix of every realm domain (`{prefix}:{database_id}`).
    pub domain_prefix: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            domain_prefix: DEFAULT_DOMAIN_PREFIX.to_string(),
        }
    }
}

impl CoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the domain prefix.
    #[must_use]
    pub fn domain_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.domain_prefix = prefix.into();
        self
    }

    /// Maps a database id to its key-value domain.
    #[must_use]
    pub fn domain_path(&self, database_id: &str) -> String {
        format!("{}:{}", self.domain_prefix, database_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.domain_path("app"), "arbor:app");
    }

    #[test]
    fn builder_pattern() {
        let config = CoreConfig::new().domain_prefix("om");
        assert_eq!(config.domain_path("chat"), "om:chat");
    }
}
