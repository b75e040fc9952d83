//! Engine configuration.
//!
//! [`EngineConfig`] can be built in code with the builder methods or deserialized
//! from a config file; every field has a default, so a partial file is valid.

use serde::Deserialize;

/// Default path that must resolve before any registration is attempted.
pub const DEFAULT_ROOT_PATH: &str = "/";

/// Configuration options for the concealment engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Well-known directory that must be reachable for a registration to proceed.
    ///
    /// Default: `/`.
    pub root_path: String,

    /// Upper bound on the number of concealed objects.
    ///
    /// Registrations beyond this bound fail with an allocation error and leave the
    /// registry untouched. Default: unbounded.
    pub max_records: Option<usize>,

    /// Initial registry capacity, reserved at engine start. Default: 0.
    pub initial_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_path: DEFAULT_ROOT_PATH.to_owned(),
            max_records: None,
            initial_capacity: 0,
        }
    }
}

impl EngineConfig {
    /// Sets the well-known root path.
    #[must_use]
    pub fn root_path(mut self, path: impl Into<String>) -> Self {
        self.root_path = path.into();
        self
    }

    /// Sets the maximum number of concealed objects.
    #[must_use]
    pub fn max_records(mut self, limit: usize) -> Self {
        self.max_records = Some(limit);
        self
    }

    /// Sets the initial registry capacity.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.root_path, "/");
        assert_eq!(config.max_records, None);
        assert_eq!(config.initial_capacity, 0);
    }

    #[test]
    fn test_builder_pattern() {
        let config = EngineConfig::default()
            .root_path("/root")
            .max_records(8)
            .initial_capacity(4);
        assert_eq!(config.root_path, "/root");
        assert_eq!(config.max_records, Some(8));
        assert_eq!(config.initial_capacity, 4);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("max_records = 3").unwrap();
        assert_eq!(config.max_records, Some(3));
        assert_eq!(config.root_path, "/");
    }

    #[test]
    fn test_full_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            root_path = "/srv"
            max_records = 16
            initial_capacity = 2
            "#,
        )
        .unwrap();
        assert_eq!(config, EngineConfig::default().root_path("/srv").max_records(16).initial_capacity(2));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<EngineConfig>("bogus = true").is_err());
    }
}
