//! Configuration module for pulsewatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "pulsewatch.db")
    pub db_path: String,
    /// Days of raw checks to keep (default: 7, the longest chart lookback)
    pub retention_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "pulsewatch.db".to_string(),
            retention_days: 7,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PULSEWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `PULSEWATCH_DB_PATH`: Database file path (default: "pulsewatch.db")
    /// - `PULSEWATCH_RETENTION_DAYS`: Days of raw checks to keep (default: 7)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("PULSEWATCH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("PULSEWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(days_str) = env::var("PULSEWATCH_RETENTION_DAYS") {
            if let Ok(days) = days_str.parse::<i64>() {
                if days > 0 {
                    cfg.retention_days = days;
                }
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "pulsewatch.db");
        assert_eq!(cfg.retention_days, 7);
    }
}
