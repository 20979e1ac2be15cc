use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use crate::{Error, Result};

/// Environment variable that selects the bucket, overriding any file value.
pub const BUCKET_ENV: &str = "BUCKET_NAME";

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    #[serde(rename = "accessKeyId")]
    pub access_key_id: Option<String>,
    #[serde(rename = "secretAccessKey")]
    pub secret_access_key: Option<String>,
    #[serde(rename = "useSSL")]
    pub use_ssl: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "Loglevel")]
    pub loglevel: Option<String>,
    #[serde(rename = "storage", default)]
    pub storage: StorageConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.apply_env(env::var(BUCKET_ENV).ok());
        Ok(config)
    }

    /// Configuration taken from the hosting environment alone.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env(env::var(BUCKET_ENV).ok());
        config
    }

    fn apply_env(&mut self, bucket: Option<String>) {
        if let Some(bucket) = bucket.filter(|b| !b.trim().is_empty()) {
            self.storage.bucket = Some(bucket);
        }
    }

    pub fn bucket(&self) -> Result<&str> {
        self.storage
            .bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or(Error::MissingBucket)
    }

    pub fn use_ssl(&self) -> bool {
        self.storage.use_ssl.unwrap_or(true)
    }

    pub fn loglevel(&self) -> &str {
        self.loglevel.as_deref().unwrap_or("info")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_storage_table() {
        let mut config: Config = toml::from_str(
            r#"
            Loglevel = "debug"

            [storage]
            bucket = "ftp-data"
            endpoint = "http://localhost:9000"
            accessKeyId = "minio"
            secretAccessKey = "minio123"
            useSSL = false
            "#,
        )
        .unwrap();
        config.apply_env(None);

        assert_eq!(config.bucket().unwrap(), "ftp-data");
        assert_eq!(config.loglevel(), "debug");
        assert_eq!(config.storage.access_key_id.as_deref(), Some("minio"));
        assert!(!config.use_ssl());
    }

    #[test]
    fn environment_overrides_bucket() {
        let mut config: Config = toml::from_str("[storage]\nbucket = \"from-file\"\n").unwrap();
        config.apply_env(Some("from-env".to_string()));
        assert_eq!(config.bucket().unwrap(), "from-env");

        config.apply_env(Some("  ".to_string()));
        assert_eq!(config.bucket().unwrap(), "from-env");
    }

    #[test]
    fn missing_bucket_is_rejected() {
        let config: Config = toml::from_str("Loglevel = \"warn\"\n").unwrap();
        assert!(matches!(config.bucket(), Err(Error::MissingBucket)));
        assert_eq!(config.loglevel(), "warn");
        assert!(config.use_ssl());
    }
}
