//! Environment-driven configuration, read the way the reference implementation
//! reads its own provider settings: directly via `std::env::var`, no config file.

const DEFAULT_DB_PATH: &str = "./taskflow.sqlite";

#[derive(Debug, Clone)]
pub struct Config {
    /// Optional remote replication endpoint (§6). `None` means local-only.
    pub couchdb_url: Option<String>,
    /// Location of the sqlite file backing `SqliteTaskStore`.
    pub db_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            couchdb_url: std::env::var("COUCHDB_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            db_path: std::env::var("TASKFLOW_DB_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
        }
    }

    pub fn replication_enabled(&self) -> bool {
        self.couchdb_url.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            couchdb_url: None,
            db_path: DEFAULT_DB_PATH.to_string(),
        }
    }
}
