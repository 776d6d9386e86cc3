pub mod loader;
pub mod validator;
pub mod watcher;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::limiter::TrafficClass;

/// Admission control configuration (loaded from JSON file, supports hot reload)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Global kill switch; disabled means every request is admitted
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Policy for authentication endpoints
    #[serde(default = "default_auth_policy")]
    pub auth: ClassPolicy,

    /// Policy for upload endpoints
    #[serde(default = "default_upload_policy")]
    pub upload: ClassPolicy,

    /// Policy for the remaining API endpoints
    #[serde(default = "default_api_policy")]
    pub api: ClassPolicy,

    /// Idle bucket sweep settings
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            auth: default_auth_policy(),
            upload: default_upload_policy(),
            api: default_api_policy(),
            sweep: SweepConfig::default(),
        }
    }
}

/// Token bucket parameters for one traffic class
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassPolicy {
    /// Maximum tokens (burst size); a fresh bucket starts full
    pub capacity: u32,

    /// Tokens restored per second (sustained throughput)
    pub refill_per_second: f64,
}

/// Settings for the periodic idle-bucket sweep
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweep passes
    pub interval_secs: u64,

    /// Buckets untouched for at least this long are dropped
    pub idle_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            idle_secs: 900,
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// Immutable snapshot of the admission configuration.
///
/// Built once per load/reload and shared behind an `ArcSwap` so the
/// middleware reads a consistent view without locking.
pub struct PolicyCache {
    full_config: Arc<AdmissionConfig>,
}

impl PolicyCache {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            full_config: Arc::new(config),
        }
    }

    /// Whether admission control is active at all
    pub fn enabled(&self) -> bool {
        self.full_config.enabled
    }

    /// Bucket parameters for a traffic class
    pub fn policy_for(&self, class: TrafficClass) -> ClassPolicy {
        match class {
            TrafficClass::Auth => self.full_config.auth,
            TrafficClass::Upload => self.full_config.upload,
            TrafficClass::Api => self.full_config.api,
        }
    }

    pub fn sweep(&self) -> SweepConfig {
        self.full_config.sweep
    }

    /// Get the full configuration (for observability)
    pub fn get_full_config(&self) -> Arc<AdmissionConfig> {
        Arc::clone(&self.full_config)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_auth_policy() -> ClassPolicy {
    ClassPolicy {
        capacity: 10,
        refill_per_second: 10.0 / 60.0, // 10 per minute
    }
}

fn default_upload_policy() -> ClassPolicy {
    ClassPolicy {
        capacity: 20,
        refill_per_second: 0.5,
    }
}

fn default_api_policy() -> ClassPolicy {
    ClassPolicy {
        capacity: 100,
        refill_per_second: 100.0 / 60.0, // 100 per minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_enabled() {
        let config = AdmissionConfig::default();
        assert!(config.enabled);
        assert!(config.auth.capacity > 0);
        assert!(config.upload.capacity > 0);
        assert!(config.api.capacity > 0);
    }

    #[test]
    fn test_policy_cache_lookup() {
        let mut config = AdmissionConfig::default();
        config.auth = ClassPolicy {
            capacity: 5,
            refill_per_second: 5.0 / 60.0,
        };

        let cache = PolicyCache::new(config);

        assert_eq!(cache.policy_for(TrafficClass::Auth).capacity, 5);
        assert_eq!(
            cache.policy_for(TrafficClass::Api).capacity,
            default_api_policy().capacity
        );
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: AdmissionConfig =
            serde_json::from_str(r#"{"auth": {"capacity": 3, "refill_per_second": 1.0}}"#)
                .unwrap();

        assert!(config.enabled);
        assert_eq!(config.auth.capacity, 3);
        assert_eq!(config.api.capacity, default_api_policy().capacity);
        assert_eq!(config.sweep.interval_secs, 300);
    }
}
