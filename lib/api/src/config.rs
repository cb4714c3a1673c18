use imgsim_core::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Matches returned per query unless configured otherwise
pub const DEFAULT_TOP_K: usize = 5;

/// Settings for the query service and its HTTP front
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root of the reference collection
    pub dataset_dir: PathBuf,
    pub host: String,
    pub http_port: u16,
    pub top_k: usize,
    /// Upper bound on decode + preprocess + extract for one upload
    pub query_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("./dataset"),
            host: "0.0.0.0".to_string(),
            http_port: 8000,
            top_k: DEFAULT_TOP_K,
            query_timeout: Duration::from_secs(10),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be at least 1".into()));
        }
        if self.query_timeout.is_zero() {
            return Err(Error::InvalidConfig("query timeout must be positive".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::InvalidConfig("max upload size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn test_rejects_zero_values() {
        let config = ServerConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            query_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
