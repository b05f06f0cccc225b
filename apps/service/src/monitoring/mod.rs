/// Monitoring engine module - handles execution of monitoring checks
///
/// This module is responsible for:
/// - Probing HTTP targets and reading certificate expiry
/// - Tracking per-target health and detecting transitions
/// - Scheduling the monitor cycle
pub mod alerts;
pub mod checker;
pub mod executor;
pub mod scheduler;
pub mod state;
pub mod tls;
pub mod types;

pub use alerts::Alert;
pub use checker::{HttpProber, Probe, ProbeSettings};
pub use executor::{CycleReport, MonitoringExecutor};
pub use scheduler::MonitoringScheduler;
pub use state::HealthTracker;
pub use tls::{CertificateCheck, TlsCheckError, TlsExpiryChecker};
pub use types::{AlertThreshold, HealthState, ProbeResult, Target};
