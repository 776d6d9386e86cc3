use crate::config::validator::validate_config;
use crate::config::{AdmissionConfig, PolicyCache};
use crate::errors::{AdmissionError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Load admission configuration from JSON file
pub async fn load_admission_config_from_file<P: AsRef<Path>>(path: P) -> Result<AdmissionConfig> {
    let path = path.as_ref();
    info!("Loading admission configuration from: {}", path.display());

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(AdmissionError::FileSystemError)?;

    let config: AdmissionConfig =
        serde_json::from_str(&contents).map_err(AdmissionError::JsonError)?;

    validate_config(&config)?;

    info!("Admission configuration loaded and validated successfully");
    log_config_summary(&config);

    Ok(config)
}

/// Resolve the admission config file path from the environment
pub fn config_path() -> String {
    std::env::var("ADMISSION_CONFIG").unwrap_or_else(|_| "config/admission.json".to_string())
}

/// Load the admission configuration, falling back to defaults when no file exists.
///
/// A missing file is not an error (the service runs with default policies);
/// an unreadable or invalid file is.
pub async fn load_config() -> Result<AdmissionConfig> {
    let path = config_path();
    debug!("Admission config path: {}", path);

    if !Path::new(&path).exists() {
        info!(
            "No admission config file at '{}', using default policies",
            path
        );
        let config = AdmissionConfig::default();
        validate_config(&config)?;
        log_config_summary(&config);
        return Ok(config);
    }

    load_admission_config_from_file(&path).await
}

/// Build a PolicyCache from a validated configuration
pub fn build_policy_cache(config: AdmissionConfig) -> PolicyCache {
    PolicyCache::new(config)
}

/// Log a summary of the loaded configuration
fn log_config_summary(config: &AdmissionConfig) {
    info!("=== Admission Configuration Summary ===");
    info!("Enabled: {}", config.enabled);

    for (name, policy) in [
        ("auth", &config.auth),
        ("upload", &config.upload),
        ("api", &config.api),
    ] {
        info!(
            "  Class {}: capacity {}, {:.2} tokens/sec",
            name, policy.capacity, policy.refill_per_second
        );
    }

    info!(
        "Sweep: every {}s, idle threshold {}s",
        config.sweep.interval_secs, config.sweep.idle_secs
    );
    info!("=======================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_file_is_error() {
        let result = load_admission_config_from_file("/nonexistent/admission.json").await;
        assert!(matches!(result, Err(AdmissionError::FileSystemError(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_json_is_error() {
        let dir = std::env::temp_dir().join("admitr-loader-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("broken.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let result = load_admission_config_from_file(&path).await;
        assert!(matches!(result, Err(AdmissionError::JsonError(_))));
    }

    #[tokio::test]
    async fn test_load_valid_file() {
        let dir = std::env::temp_dir().join("admitr-loader-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("valid.json");
        tokio::fs::write(
            &path,
            r#"{"enabled": true, "auth": {"capacity": 5, "refill_per_second": 0.0833}}"#,
        )
        .await
        .unwrap();

        let config = load_admission_config_from_file(&path).await.unwrap();
        assert_eq!(config.auth.capacity, 5);
        assert!(config.enabled);
    }
}
