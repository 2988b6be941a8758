use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Default bucket for staged raw logs
pub const DEFAULT_S3_BUCKET: &str = "horizon-raw-logs";

/// Default S3 region
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Which staging implementation backs the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StagingBackend {
    #[default]
    S3,
    Memory,
}

impl FromStr for StagingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown STAGING_BACKEND '{}' (expected s3 or memory)", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StagingBackend,
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StagingBackend::default(),
            endpoint: None,
            region: DEFAULT_S3_REGION.to_string(),
            bucket: DEFAULT_S3_BUCKET.to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: false,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match env::var("STAGING_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => StagingBackend::default(),
        };

        let config = Self {
            backend,
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| DEFAULT_S3_BUCKET.to_string()),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            backend: StagingBackend::S3,
            endpoint: Some(endpoint.into()),
            region: DEFAULT_S3_REGION.to_string(),
            bucket: bucket.into(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend == StagingBackend::S3 && self.bucket.trim().is_empty() {
            anyhow::bail!("S3_BUCKET cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_minio() {
        let config = StorageConfig::for_minio("http://localhost:9000", "test-bucket");
        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
        assert_eq!(config.bucket, "test-bucket");
        assert_eq!(config.backend, StagingBackend::S3);
        assert!(config.path_style);
    }

    #[test]
    fn test_staging_backend_from_str() {
        assert_eq!("S3".parse::<StagingBackend>().unwrap(), StagingBackend::S3);
        assert_eq!("memory".parse::<StagingBackend>().unwrap(), StagingBackend::Memory);
        assert!("gcs".parse::<StagingBackend>().is_err());
    }

    #[test]
    fn test_empty_bucket_rejected_for_s3() {
        let mut config = StorageConfig::for_minio("http://localhost:9000", " ");
        assert!(config.validate().is_err());

        config.backend = StagingBackend::Memory;
        assert!(config.validate().is_ok());
    }
}
