use crate::config::{AdmissionConfig, ClassPolicy, SweepConfig};
use crate::errors::{AdmissionError, Result};
use tracing::{debug, warn};

/// Validate the entire admission configuration
pub fn validate_config(config: &AdmissionConfig) -> Result<()> {
    debug!("Validating configuration...");

    validate_class_policy(&config.auth, "auth")?;
    validate_class_policy(&config.upload, "upload")?;
    validate_class_policy(&config.api, "api")?;
    validate_sweep_config(&config.sweep)?;

    debug!("Configuration validation successful");
    Ok(())
}

/// Validate one traffic class policy
fn validate_class_policy(policy: &ClassPolicy, class: &str) -> Result<()> {
    if policy.capacity == 0 {
        return Err(AdmissionError::InvalidPolicy(format!(
            "capacity must be positive for class '{}'",
            class
        )));
    }

    if policy.refill_per_second <= 0.0 || !policy.refill_per_second.is_finite() {
        return Err(AdmissionError::InvalidPolicy(format!(
            "refill_per_second must be positive for class '{}' (got {})",
            class, policy.refill_per_second
        )));
    }

    if policy.refill_per_second > 1_000_000.0 {
        warn!(
            "Very high refill_per_second ({}) for class '{}'",
            policy.refill_per_second, class
        );
    }

    if policy.capacity > 1_000_000 {
        warn!("Very high capacity ({}) for class '{}'", policy.capacity, class);
    }

    // Check if capacity is reasonable relative to the refill rate
    let seconds_to_fill = policy.capacity as f64 / policy.refill_per_second;
    if seconds_to_fill < 1.0 {
        warn!(
            "Capacity for class '{}' is very small relative to refill rate (fills in {:.2}s)",
            class, seconds_to_fill
        );
    }

    if seconds_to_fill > 86400.0 {
        warn!(
            "Capacity for class '{}' is very large relative to refill rate (takes {:.2} hours to fill)",
            class,
            seconds_to_fill / 3600.0
        );
    }

    debug!("Class policy valid for '{}'", class);
    Ok(())
}

/// Validate sweep settings
fn validate_sweep_config(sweep: &SweepConfig) -> Result<()> {
    if sweep.interval_secs == 0 {
        return Err(AdmissionError::ConfigurationError(
            "sweep.interval_secs must be greater than 0".to_string(),
        ));
    }

    if sweep.idle_secs == 0 {
        return Err(AdmissionError::ConfigurationError(
            "sweep.idle_secs must be greater than 0".to_string(),
        ));
    }

    if sweep.idle_secs < sweep.interval_secs {
        warn!(
            "sweep.idle_secs ({}) is below sweep.interval_secs ({}); buckets may be dropped after a single pass",
            sweep.idle_secs, sweep.interval_secs
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_config() {
        let config = AdmissionConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let policy = ClassPolicy {
            capacity: 0,
            refill_per_second: 1.0,
        };

        assert!(validate_class_policy(&policy, "auth").is_err());
    }

    #[test]
    fn test_validate_zero_refill_rate() {
        let policy = ClassPolicy {
            capacity: 100,
            refill_per_second: 0.0,
        };

        assert!(validate_class_policy(&policy, "api").is_err());
    }

    #[test]
    fn test_validate_negative_refill_rate() {
        let mut config = AdmissionConfig::default();
        config.upload = ClassPolicy {
            capacity: 10,
            refill_per_second: -2.0,
        };

        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_sweep_interval() {
        let mut config = AdmissionConfig::default();
        config.sweep.interval_secs = 0;

        assert!(validate_config(&config).is_err());
    }
}
