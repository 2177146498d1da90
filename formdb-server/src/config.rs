use std::path::PathBuf;

/// Server settings, read from the environment once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// JSON file holding all submissions
    pub data_file: PathBuf,
    /// Optional schema YAML; the built-in form is served when unset
    pub schema_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_file: PathBuf::from("data").join("submissions.json"),
            schema_file: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `FORMDB_PORT` wins over `PORT`;
    /// an unparseable port falls back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ServerConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = non_empty("FORMDB_PORT")
            .or_else(|| non_empty("PORT"))
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(defaults.port);

        ServerConfig {
            host: non_empty("FORMDB_HOST").unwrap_or(defaults.host),
            port,
            data_file: non_empty("FORMDB_DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
            schema_file: non_empty("FORMDB_SCHEMA").map(PathBuf::from),
        }
    }
}
