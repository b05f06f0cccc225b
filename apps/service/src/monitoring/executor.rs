use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::alerts::Alert;
use super::checker::Probe;
use super::state::HealthTracker;
use super::tls::CertificateCheck;
use super::types::{AlertThreshold, Target, unique_hosts};
use crate::notifier::AlertDispatcher;

/// Summary of one completed monitor cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Alerts emitted, in emission order
    pub alerts: Vec<Alert>,

    /// Hosts whose certificate was checked
    pub hosts_checked: usize,

    /// Hosts whose certificate check failed and were skipped
    pub host_failures: usize,

    pub elapsed: Duration,
}

impl CycleReport {
    pub fn transitions(&self) -> usize {
        self.alerts.iter().filter(|alert| alert.is_transition()).count()
    }

    pub fn certificate_alerts(&self) -> usize {
        self.alerts.len() - self.transitions()
    }
}

/// Clears the running flag when the cycle ends, however it ends
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok().map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Monitoring executor - runs one full check cycle over every target and host
pub struct MonitoringExecutor {
    targets: Arc<[Target]>,
    prober: Arc<dyn Probe>,
    certificates: Arc<dyn CertificateCheck>,
    tracker: Arc<HealthTracker>,
    threshold: AlertThreshold,
    dispatcher: AlertDispatcher,
    running: AtomicBool,
}

impl MonitoringExecutor {
    pub fn new(
        targets: Arc<[Target]>,
        prober: Arc<dyn Probe>,
        certificates: Arc<dyn CertificateCheck>,
        tracker: Arc<HealthTracker>,
        threshold: AlertThreshold,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            targets,
            prober,
            certificates,
            tracker,
            threshold,
            dispatcher,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run all checks once and deliver the resulting alerts.
    ///
    /// Returns `None` without doing anything if another cycle is still running.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        let Some(_guard) = CycleGuard::acquire(&self.running) else {
            tracing::warn!("Previous monitor cycle still running, skipping");
            return None;
        };

        let start = Instant::now();
        let mut report = CycleReport::default();
        tracing::debug!(targets = self.targets.len(), "Starting monitor cycle");

        for target in self.targets.iter() {
            let result = self.prober.probe(target).await;
            if let Some(alert) = self.tracker.evaluate(target, &result) {
                self.emit(alert, &mut report).await;
            }
        }

        for host in unique_hosts(&self.targets) {
            report.hosts_checked += 1;
            match self.certificates.days_until_expiry(&host).await {
                Ok(days) if self.threshold.is_expiring(&host, days) => {
                    self.emit(Alert::CertificateExpiring { host, days }, &mut report).await;
                }
                Ok(days) => tracing::debug!(%host, days, "Certificate expiry ok"),
                Err(e) => {
                    report.host_failures += 1;
                    tracing::warn!(%host, error = %e, "Certificate check failed, skipping host");
                }
            }
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            transitions = report.transitions(),
            certificate_alerts = report.certificate_alerts(),
            hosts_checked = report.hosts_checked,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Monitor cycle finished"
        );

        Some(report)
    }

    async fn emit(&self, alert: Alert, report: &mut CycleReport) {
        let text = alert.to_string();
        let delivered = self.dispatcher.broadcast(&text).await;
        tracing::info!(alert = %text, delivered, "Alert emitted");
        report.alerts.push(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::tls::TlsCheckError;
    use crate::monitoring::types::{HealthState, ProbeResult};
    use crate::notifier::{ChatId, Notifier, NotifyError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays scripted results per target key, unhealthy once the script runs out
    #[derive(Default)]
    struct ScriptedProber {
        scripts: Mutex<HashMap<String, Vec<ProbeResult>>>,
    }

    impl ScriptedProber {
        fn script(self, key: &str, results: Vec<ProbeResult>) -> Self {
            self.scripts.lock().unwrap().insert(key.to_string(), results.into_iter().rev().collect());
            self
        }
    }

    #[async_trait::async_trait]
    impl Probe for ScriptedProber {
        async fn probe(&self, target: &Target) -> ProbeResult {
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&target.key)
                .and_then(Vec::pop)
                .unwrap_or_else(ProbeResult::no_response)
        }
    }

    #[derive(Default)]
    struct FixedCertificates {
        days: HashMap<String, i64>,
        calls: Mutex<Vec<String>>,
    }

    impl FixedCertificates {
        fn with(mut self, host: &str, days: i64) -> Self {
            self.days.insert(host.to_string(), days);
            self
        }
    }

    #[async_trait::async_trait]
    impl CertificateCheck for FixedCertificates {
        async fn days_until_expiry(&self, host: &str) -> Result<i64, TlsCheckError> {
            self.calls.lock().unwrap().push(host.to_string());
            self.days.get(host).copied().ok_or(TlsCheckError::NoCertificate)
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(ChatId, String)>>,
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, recipient: ChatId, text: &str) -> Result<(), NotifyError> {
            self.messages.lock().unwrap().push((recipient, text.to_string()));
            Ok(())
        }
    }

    fn up() -> ProbeResult {
        ProbeResult::responded(true, Duration::from_millis(20), 200)
    }

    fn unavailable() -> ProbeResult {
        ProbeResult::responded(false, Duration::from_millis(20), 503)
    }

    struct Fixture {
        executor: MonitoringExecutor,
        tracker: Arc<HealthTracker>,
        certificates: Arc<FixedCertificates>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture(targets: Vec<Target>, prober: ScriptedProber, certificates: FixedCertificates) -> Fixture {
        let targets: Arc<[Target]> = targets.into();
        let tracker = Arc::new(HealthTracker::for_targets(&targets));
        let certificates = Arc::new(certificates);
        let notifier = Arc::new(RecordingNotifier::default());
        let executor = MonitoringExecutor::new(
            targets,
            Arc::new(prober),
            certificates.clone(),
            tracker.clone(),
            AlertThreshold::new(7),
            AlertDispatcher::new(notifier.clone(), vec![1, 2]),
        );
        Fixture { executor, tracker, certificates, notifier }
    }

    #[tokio::test]
    async fn test_first_cycle_alerts_once_per_target() {
        let targets = vec![
            Target::new("web", "WEB main", "https://example.com"),
            Target::new("api", "API offers", "https://api.example.com").with_path("/public/offers"),
        ];
        let prober = ScriptedProber::default().script("web", vec![up()]);
        let f = fixture(targets, prober, FixedCertificates::default());

        let report = f.executor.run_cycle().await.unwrap();

        assert_eq!(report.transitions(), 2);
        assert_eq!(f.tracker.get("web"), HealthState::Up);
        assert_eq!(f.tracker.get("api"), HealthState::Down);

        // Both recipients receive every alert
        let messages = f.notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], (1, "✅ WEB main is UP (200, 0.020s)".to_string()));
        assert_eq!(messages[2], (1, "🚨 API offers is DOWN (no response, N/A)".to_string()));
    }

    #[tokio::test]
    async fn test_503_then_200_alerts_down_then_up() {
        let targets = vec![Target::new("web", "WEB main", "https://example.com")];
        let prober = ScriptedProber::default().script("web", vec![unavailable(), up(), up()]);
        let f = fixture(targets, prober, FixedCertificates::default().with("example.com", 90));

        let first = f.executor.run_cycle().await.unwrap();
        assert_eq!(first.alerts.len(), 1);
        assert!(first.alerts[0].to_string().starts_with("🚨 WEB main is DOWN (503"));

        let second = f.executor.run_cycle().await.unwrap();
        assert_eq!(second.alerts.len(), 1);
        assert!(second.alerts[0].to_string().starts_with("✅ WEB main is UP (200"));

        let third = f.executor.run_cycle().await.unwrap();
        assert!(third.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_certificate_alerts_repeat_every_cycle_below_threshold() {
        let targets = vec![
            Target::new("soon", "Soon", "https://soon.example.com"),
            Target::new("later", "Later", "https://later.example.com"),
        ];
        let prober = ScriptedProber::default()
            .script("soon", vec![up(), up(), up()])
            .script("later", vec![up(), up(), up()]);
        let certificates =
            FixedCertificates::default().with("soon.example.com", 5).with("later.example.com", 10);
        let f = fixture(targets, prober, certificates);

        f.executor.run_cycle().await.unwrap();
        for _ in 0..2 {
            let report = f.executor.run_cycle().await.unwrap();
            assert_eq!(
                report.alerts,
                vec![Alert::CertificateExpiring { host: "soon.example.com".into(), days: 5 }]
            );
        }
    }

    #[tokio::test]
    async fn test_shared_host_is_checked_once() {
        let targets = vec![
            Target::new("web", "WEB", "https://example.com"),
            Target::new("api", "API", "https://example.com").with_path("/api"),
        ];
        let f = fixture(targets, ScriptedProber::default(), FixedCertificates::default().with("example.com", 3));

        let report = f.executor.run_cycle().await.unwrap();

        assert_eq!(report.hosts_checked, 1);
        assert_eq!(report.certificate_alerts(), 1);
        assert_eq!(*f.certificates.calls.lock().unwrap(), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_failed_certificate_check_is_skipped() {
        let targets = vec![Target::new("web", "WEB", "https://nonexistent.invalid")];
        let prober = ScriptedProber::default().script("web", vec![up()]);
        let f = fixture(targets, prober, FixedCertificates::default());

        let report = f.executor.run_cycle().await.unwrap();

        assert_eq!(report.host_failures, 1);
        assert_eq!(report.certificate_alerts(), 0);
        assert_eq!(report.transitions(), 1);
    }

    #[tokio::test]
    async fn test_per_host_override_applies() {
        let targets = vec![Target::new("web", "WEB", "https://example.com")];
        let prober = ScriptedProber::default().script("web", vec![up()]);
        let f = fixture(targets, prober, FixedCertificates::default().with("example.com", 10));
        let executor = MonitoringExecutor {
            threshold: AlertThreshold::new(7).with_override("example.com", 14),
            ..f.executor
        };

        let report = executor.run_cycle().await.unwrap();
        assert_eq!(report.certificate_alerts(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_cycle_is_rejected() {
        let f = fixture(
            vec![Target::new("web", "WEB", "https://example.com")],
            ScriptedProber::default(),
            FixedCertificates::default(),
        );

        let guard = CycleGuard::acquire(&f.executor.running).unwrap();
        assert!(f.executor.is_running());
        assert!(f.executor.run_cycle().await.is_none());

        drop(guard);
        assert!(f.executor.run_cycle().await.is_some());
    }
}
