pub mod token_bucket;

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use crate::config::PolicyCache;

pub use token_bucket::{BucketRegistry, TokenBucket};

/// Endpoint categories sharing one rate-limit policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficClass {
    Auth,
    Upload,
    Api,
}

impl TrafficClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficClass::Auth => "AUTH",
            TrafficClass::Upload => "UPLOAD",
            TrafficClass::Api => "API",
        }
    }
}

/// Path predicate for one classification rule
enum PathRule {
    Prefix(&'static str),
    Contains(&'static str),
}

impl PathRule {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathRule::Prefix(prefix) => path.starts_with(prefix),
            PathRule::Contains(segment) => path.contains(segment),
        }
    }
}

/// Ordered rule table; first match wins. Auth must be checked before the
/// generic API prefix, and upload segments anywhere on an API path take
/// precedence over the generic class.
const CLASS_RULES: &[(PathRule, TrafficClass)] = &[
    (PathRule::Prefix("/api/auth/"), TrafficClass::Auth),
    (PathRule::Contains("/upload"), TrafficClass::Upload),
    (PathRule::Prefix("/api/"), TrafficClass::Api),
];

/// Classify a request path into a traffic class.
///
/// Returns `None` for paths outside the API surface; those requests are
/// exempt from admission control.
pub fn classify_path(path: &str) -> Option<TrafficClass> {
    CLASS_RULES
        .iter()
        .find(|(rule, _)| rule.matches(path))
        .map(|(_, class)| *class)
}

/// Result of one bucket-level admission attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Admitted; `remaining` is the post-consumption token count
    Allowed { remaining: u64 },
    /// Denied; `retry_after` estimates when one whole token will be available
    Denied { retry_after: Duration },
}

/// Outcome of a full admission check, as consumed by the middleware
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Admitted against a bucket
    Granted { class: TrafficClass, remaining: u64 },
    /// Rejected; the caller should retry later
    Denied {
        class: TrafficClass,
        retry_after: Duration,
    },
    /// No bucket was consulted (path outside any class, or admission
    /// control globally disabled)
    Exempt,
}

/// Process-scoped admission controller.
///
/// Constructed once at startup and injected into the request pipeline;
/// holds the bucket registry and the hot-reloadable policy snapshot.
pub struct AdmissionController {
    registry: BucketRegistry,
    policies: Arc<ArcSwap<PolicyCache>>,
}

impl AdmissionController {
    pub fn new(policies: Arc<ArcSwap<PolicyCache>>) -> Self {
        Self {
            registry: BucketRegistry::new(),
            policies,
        }
    }

    /// Decide whether to admit a request.
    ///
    /// This is a total, non-blocking, in-memory computation: it never
    /// fails, and "deny" is a normal return value.
    pub fn admit(&self, path: &str, identity: &str) -> Admission {
        let snapshot = self.policies.load();

        // Kill switch: admit everything, touch nothing.
        if !snapshot.enabled() {
            return Admission::Exempt;
        }

        let Some(class) = classify_path(path) else {
            crate::metrics::record_exempt();
            return Admission::Exempt;
        };

        let started = Instant::now();
        let policy = snapshot.policy_for(class);
        let key = format!("{}:{}", class.as_str(), identity);
        let decision = self.registry.try_admit(&key, &policy);

        crate::metrics::record_admission(
            class.as_str(),
            matches!(decision, Decision::Allowed { .. }),
            started.elapsed().as_secs_f64(),
        );

        match decision {
            Decision::Allowed { remaining } => {
                debug!(
                    class = class.as_str(),
                    identity = identity,
                    remaining = remaining,
                    "request admitted"
                );
                Admission::Granted { class, remaining }
            }
            Decision::Denied { retry_after } => {
                crate::metrics::record_denied(class.as_str());
                warn!(
                    class = class.as_str(),
                    identity = identity,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "rate limit exceeded"
                );
                Admission::Denied { class, retry_after }
            }
        }
    }

    /// Number of live buckets in the registry
    pub fn tracked_buckets(&self) -> usize {
        self.registry.len()
    }

    /// Drop buckets idle beyond the configured threshold.
    ///
    /// Returns the number of buckets removed. A bucket idle that long has
    /// refilled to capacity, so eviction is indistinguishable from a fresh
    /// bucket on the next request.
    pub fn sweep_idle(&self) -> usize {
        let threshold = self.policies.load().sweep().idle_threshold();
        let removed = self.registry.sweep_idle(threshold);

        crate::metrics::record_swept(removed);
        crate::metrics::update_tracked_buckets(self.registry.len());

        removed
    }
}

/// Periodic idle-bucket sweeper.
///
/// Re-reads the sweep cadence from the current snapshot each pass so
/// hot-reloaded settings take effect without a restart.
pub async fn run_sweeper(controller: Arc<AdmissionController>) {
    loop {
        let interval = controller.policies.load().sweep().interval();
        tokio::time::sleep(interval).await;

        let removed = controller.sweep_idle();
        if removed > 0 {
            info!(
                removed = removed,
                live = controller.tracked_buckets(),
                "swept idle buckets"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdmissionConfig, ClassPolicy, PolicyCache};

    fn controller_with(config: AdmissionConfig) -> AdmissionController {
        let cache = Arc::new(ArcSwap::from_pointee(PolicyCache::new(config)));
        AdmissionController::new(cache)
    }

    fn login_config(capacity: u32) -> AdmissionConfig {
        let mut config = AdmissionConfig::default();
        config.auth = ClassPolicy {
            capacity,
            refill_per_second: capacity as f64 / 60.0,
        };
        config
    }

    #[test]
    fn test_classify_auth_before_api() {
        assert_eq!(classify_path("/api/auth/login"), Some(TrafficClass::Auth));
        assert_eq!(classify_path("/api/auth/register"), Some(TrafficClass::Auth));
    }

    #[test]
    fn test_classify_upload_segment() {
        assert_eq!(
            classify_path("/api/courses/42/upload"),
            Some(TrafficClass::Upload)
        );
        assert_eq!(
            classify_path("/api/assignments/7/uploads/3"),
            Some(TrafficClass::Upload)
        );
    }

    #[test]
    fn test_classify_generic_api() {
        assert_eq!(classify_path("/api/courses"), Some(TrafficClass::Api));
        assert_eq!(classify_path("/api/quizzes/9"), Some(TrafficClass::Api));
    }

    #[test]
    fn test_classify_exempt_paths() {
        assert_eq!(classify_path("/health"), None);
        assert_eq!(classify_path("/"), None);
        assert_eq!(classify_path("/docs"), None);
    }

    #[test]
    fn test_classify_is_idempotent() {
        for _ in 0..3 {
            assert_eq!(classify_path("/api/auth/login"), Some(TrafficClass::Auth));
        }
    }

    #[test]
    fn test_capacity_admits_then_denies() {
        // capacity=5, refill 5/60s: five immediate requests pass, the sixth is denied
        let controller = controller_with(login_config(5));

        for i in 0..5 {
            let outcome = controller.admit("/api/auth/login", "ip:1.2.3.4");
            assert!(
                matches!(outcome, Admission::Granted { .. }),
                "request {} should be admitted",
                i
            );
        }

        match controller.admit("/api/auth/login", "ip:1.2.3.4") {
            Admission::Denied { class, retry_after } => {
                assert_eq!(class, TrafficClass::Auth);
                assert!(retry_after > Duration::ZERO);
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[test]
    fn test_clients_have_independent_buckets() {
        let controller = controller_with(login_config(2));

        // Exhaust client A
        assert!(matches!(
            controller.admit("/api/auth/login", "ip:10.0.0.1"),
            Admission::Granted { .. }
        ));
        assert!(matches!(
            controller.admit("/api/auth/login", "ip:10.0.0.1"),
            Admission::Granted { .. }
        ));
        assert!(matches!(
            controller.admit("/api/auth/login", "ip:10.0.0.1"),
            Admission::Denied { .. }
        ));

        // Client B is unaffected
        assert!(matches!(
            controller.admit("/api/auth/login", "ip:10.0.0.2"),
            Admission::Granted { .. }
        ));
    }

    #[test]
    fn test_classes_have_independent_buckets() {
        let mut config = login_config(1);
        config.api = ClassPolicy {
            capacity: 1,
            refill_per_second: 0.001,
        };
        let controller = controller_with(config);

        assert!(matches!(
            controller.admit("/api/auth/login", "ip:1.1.1.1"),
            Admission::Granted { .. }
        ));
        assert!(matches!(
            controller.admit("/api/auth/login", "ip:1.1.1.1"),
            Admission::Denied { .. }
        ));

        // Same identity, different class: separate bucket
        assert!(matches!(
            controller.admit("/api/courses", "ip:1.1.1.1"),
            Admission::Granted { .. }
        ));
    }

    #[test]
    fn test_disabled_admits_everything() {
        let mut config = login_config(1);
        config.enabled = false;
        let controller = controller_with(config);

        for _ in 0..50 {
            assert_eq!(
                controller.admit("/api/auth/login", "ip:1.2.3.4"),
                Admission::Exempt
            );
        }
        assert_eq!(controller.tracked_buckets(), 0);
    }

    #[test]
    fn test_exempt_path_consults_no_bucket() {
        let controller = controller_with(login_config(1));

        for _ in 0..10 {
            assert_eq!(controller.admit("/health", "ip:1.2.3.4"), Admission::Exempt);
        }
        assert_eq!(controller.tracked_buckets(), 0);
    }

    #[test]
    fn test_policy_swap_applies_to_new_buckets() {
        let cache = Arc::new(ArcSwap::from_pointee(PolicyCache::new(login_config(1))));
        let controller = AdmissionController::new(Arc::clone(&cache));

        assert!(matches!(
            controller.admit("/api/auth/login", "ip:1.2.3.4"),
            Admission::Granted { .. }
        ));
        assert!(matches!(
            controller.admit("/api/auth/login", "ip:1.2.3.4"),
            Admission::Denied { .. }
        ));

        cache.store(Arc::new(PolicyCache::new(login_config(3))));

        // Existing bucket keeps its creation-time policy
        assert!(matches!(
            controller.admit("/api/auth/login", "ip:1.2.3.4"),
            Admission::Denied { .. }
        ));

        // A new client gets the swapped policy
        assert!(matches!(
            controller.admit("/api/auth/login", "ip:5.6.7.8"),
            Admission::Granted { remaining: 2, .. }
        ));
    }
}
