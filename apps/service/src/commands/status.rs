use serde::Serialize;
use std::sync::Arc;

use crate::monitoring::types::unique_hosts;
use crate::monitoring::{CertificateCheck, HealthState, HealthTracker, Target};

/// One line of the services block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub key: String,
    pub name: String,
    pub state: HealthState,
}

/// Builds status replies from cached health and fresh certificate checks
#[derive(Clone)]
pub struct StatusReporter {
    targets: Arc<[Target]>,
    tracker: Arc<HealthTracker>,
    certificates: Arc<dyn CertificateCheck>,
}

impl StatusReporter {
    pub fn new(
        targets: Arc<[Target]>,
        tracker: Arc<HealthTracker>,
        certificates: Arc<dyn CertificateCheck>,
    ) -> Self {
        Self { targets, tracker, certificates }
    }

    /// Cached health per target, in configuration order
    pub fn services(&self) -> Vec<ServiceStatus> {
        let snapshot = self.tracker.snapshot();
        self.targets
            .iter()
            .map(|target| ServiceStatus {
                key: target.key.clone(),
                name: target.name.clone(),
                state: snapshot.get(&target.key).copied().unwrap_or_default(),
            })
            .collect()
    }

    /// Freshly computed days remaining per unique host, `None` when the check failed
    pub async fn certificates(&self) -> Vec<(String, Option<i64>)> {
        let mut rows = Vec::new();
        for host in unique_hosts(&self.targets) {
            let days = match self.certificates.days_until_expiry(&host).await {
                Ok(days) => Some(days),
                Err(e) => {
                    tracing::debug!(%host, error = %e, "Certificate check failed for status");
                    None
                }
            };
            rows.push((host, days));
        }
        rows
    }

    /// Markdown status block
    pub async fn render(&self) -> String {
        let services: Vec<String> = self
            .services()
            .into_iter()
            .map(|service| format!("• {}: *{}*", service.name, service.state))
            .collect();

        let certificates: Vec<String> = self
            .certificates()
            .await
            .into_iter()
            .map(|(host, days)| match days {
                Some(days) => format!("• {host}: *{days} days*"),
                None => format!("• {host}: *N/A*"),
            })
            .collect();

        format!("🌐 Services:\n{}\n\n🔒 SSL:\n{}", services.join("\n"), certificates.join("\n"))
    }
}
