pub mod config;
pub mod errors;
pub mod limiter;
pub mod metrics;
pub mod metrics_server;
pub mod server;

// Re-export commonly used types
pub use config::{AdmissionConfig, ClassPolicy, PolicyCache};
pub use errors::{AdmissionError, Result};
pub use limiter::{Admission, AdmissionController, TrafficClass};
pub use server::{ServerConfig, start_server};
