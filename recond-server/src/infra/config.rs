use std::{env, path::PathBuf};

/// Server configuration loaded via environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    /// Root directory for project scopes and tool results.
    pub data_dir: PathBuf,

    // CORS settings; empty means any origin, matching the original
    // dashboard's open development posture.
    pub cors_allowed_origins: Vec<String>,

    /// Maximum number of buffered log lines replayed on a `status` bind.
    pub log_tail_limit: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            data_dir: env::var("RECOND_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            log_tail_limit: env::var("RECOND_LOG_TAIL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
        })
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
