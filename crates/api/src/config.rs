/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Path to the JSON device inventory file.
    pub inventory_path: String,
    /// Directory holding playbooks, one `<action>.yml` per action.
    pub playbook_dir: String,
    /// Directory holding vault password files, one per secret id.
    /// Workflows referencing a vault secret fail without it.
    pub vault_password_dir: Option<String>,
    /// Per-action executor timeout in seconds (default: `600`).
    pub action_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                 |
    /// |-----------------------|-------------------------|
    /// | `HOST`                | `0.0.0.0`               |
    /// | `PORT`                | `3000`                  |
    /// | `CORS_ORIGINS`        | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`| `30`                    |
    /// | `INVENTORY_PATH`      | `devices.json`          |
    /// | `PLAYBOOK_DIR`        | `playbooks`             |
    /// | `VAULT_PASSWORD_DIR`  | unset                   |
    /// | `ACTION_TIMEOUT_SECS` | `600`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let inventory_path =
            std::env::var("INVENTORY_PATH").unwrap_or_else(|_| "devices.json".into());

        let playbook_dir = std::env::var("PLAYBOOK_DIR").unwrap_or_else(|_| "playbooks".into());

        let vault_password_dir = std::env::var("VAULT_PASSWORD_DIR").ok();

        let action_timeout_secs: u64 = std::env::var("ACTION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("ACTION_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            inventory_path,
            playbook_dir,
            vault_password_dir,
            action_timeout_secs,
        }
    }
}
