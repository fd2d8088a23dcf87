use crate::domains::publish::types::DigestAlgorithm;
use crate::errors::{ExportError, ExportResult};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of the environment variables read by [`ExportConfig::from_env`]
pub const ENV_PREFIX: &str = "DATASTREAM_EXPORT_";

/// Exporter settings; batch capacities bound how many records are held at once
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub publish_batch_size: usize,
    pub csv_batch_size: usize,
    pub json_batch_size: usize,
    pub metadata_batch_size: usize,
    pub query_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Kept as a name so an unknown algorithm surfaces when publishing
    pub digest_algorithm: String,
    /// Treat non-2xx upload responses as failed attempts
    pub require_success_status: bool,
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            publish_batch_size: 1_000_000,
            csv_batch_size: 1_000_000,
            json_batch_size: 10_000,
            metadata_batch_size: 10,
            query_timeout_secs: 60,
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            digest_algorithm: DigestAlgorithm::Sha1.name().to_string(),
            require_success_status: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ExportConfig {
    /// Defaults overridden by `.env` and `DATASTREAM_EXPORT_*` variables
    pub fn from_env() -> ExportResult<Self> {
        // A missing .env file is fine
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each prefixed key
    pub fn from_lookup<F>(lookup: F) -> ExportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        override_with(&get, "PUBLISH_BATCH_SIZE", &mut config.publish_batch_size)?;
        override_with(&get, "CSV_BATCH_SIZE", &mut config.csv_batch_size)?;
        override_with(&get, "JSON_BATCH_SIZE", &mut config.json_batch_size)?;
        override_with(&get, "METADATA_BATCH_SIZE", &mut config.metadata_batch_size)?;
        override_with(&get, "QUERY_TIMEOUT_SECS", &mut config.query_timeout_secs)?;
        override_with(&get, "REQUEST_TIMEOUT_SECS", &mut config.request_timeout_secs)?;
        override_with(&get, "CONNECT_TIMEOUT_SECS", &mut config.connect_timeout_secs)?;
        override_with(&get, "REQUIRE_SUCCESS_STATUS", &mut config.require_success_status)?;
        if let Some(algorithm) = get("DIGEST_ALGORITHM") {
            config.digest_algorithm = algorithm;
        }
        if let Some(dir) = get("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ExportResult<()> {
        for (name, value) in [
            ("publish_batch_size", self.publish_batch_size),
            ("csv_batch_size", self.csv_batch_size),
            ("json_batch_size", self.json_batch_size),
            ("metadata_batch_size", self.metadata_batch_size),
        ] {
            if value == 0 {
                return Err(ExportError::InvalidConfig(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn override_with<T, G>(get: &G, name: &str, field: &mut T) -> ExportResult<()>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(name) {
        *field = raw.trim().parse().map_err(|_| {
            ExportError::InvalidConfig(format!("{}{} has invalid value '{}'", ENV_PREFIX, name, raw))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExportConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.publish_batch_size, 1_000_000);
        assert_eq!(config.json_batch_size, 10_000);
        assert_eq!(config.digest_algorithm, "sha1");
        assert!(!config.require_success_status);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_overrides() {
        let config = ExportConfig::from_lookup(lookup(&[
            ("PUBLISH_BATCH_SIZE", "500"),
            ("REQUIRE_SUCCESS_STATUS", "true"),
            ("DIGEST_ALGORITHM", "sha256"),
            ("OUTPUT_DIR", "/tmp/out"),
        ]))
        .unwrap();

        assert_eq!(config.publish_batch_size, 500);
        assert!(config.require_success_status);
        assert_eq!(config.digest_algorithm, "sha256");
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.csv_batch_size, 1_000_000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            ExportConfig::from_lookup(lookup(&[("CSV_BATCH_SIZE", "lots")])),
            Err(ExportError::InvalidConfig(_))
        ));
        assert!(matches!(
            ExportConfig::from_lookup(lookup(&[("JSON_BATCH_SIZE", "0")])),
            Err(ExportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ExportConfig = serde_json::from_str(r#"{"csv_batch_size": 5}"#).unwrap();
        assert_eq!(config.csv_batch_size, 5);
        assert_eq!(config.metadata_batch_size, 10);
    }
}
