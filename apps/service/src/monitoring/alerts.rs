use std::fmt;
use std::time::Duration;

/// Human-readable notification produced by a monitor cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// Target moved to `up`
    Up { name: String, status_code: Option<u16>, latency: Option<Duration> },

    /// Target moved to `down`
    Down { name: String, status_code: Option<u16>, latency: Option<Duration> },

    /// Certificate for `host` is below its threshold
    CertificateExpiring { host: String, days: i64 },
}

impl Alert {
    pub fn is_transition(&self) -> bool {
        matches!(self, Alert::Up { .. } | Alert::Down { .. })
    }
}

struct StatusCode(Option<u16>);

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{code}"),
            None => write!(f, "no response"),
        }
    }
}

struct Latency(Option<Duration>);

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(latency) => write!(f, "{:.3}s", latency.as_secs_f64()),
            None => write!(f, "N/A"),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::Up { name, status_code, latency } => {
                write!(f, "✅ {name} is UP ({}, {})", StatusCode(*status_code), Latency(*latency))
            }
            Alert::Down { name, status_code, latency } => {
                write!(f, "🚨 {name} is DOWN ({}, {})", StatusCode(*status_code), Latency(*latency))
            }
            Alert::CertificateExpiring { host, days } => {
                write!(f, "⚠️ SSL for *{host}* expires in {days} day(s)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_message() {
        let alert = Alert::Up {
            name: "WEB main".into(),
            status_code: Some(200),
            latency: Some(Duration::from_millis(123)),
        };
        assert_eq!(alert.to_string(), "✅ WEB main is UP (200, 0.123s)");
    }

    #[test]
    fn test_down_message_without_response() {
        let alert = Alert::Down { name: "API offers".into(), status_code: None, latency: None };
        assert_eq!(alert.to_string(), "🚨 API offers is DOWN (no response, N/A)");
    }

    #[test]
    fn test_down_message_with_status() {
        let alert = Alert::Down {
            name: "API offers".into(),
            status_code: Some(503),
            latency: Some(Duration::from_millis(1500)),
        };
        assert_eq!(alert.to_string(), "🚨 API offers is DOWN (503, 1.500s)");
    }

    #[test]
    fn test_certificate_message() {
        let alert = Alert::CertificateExpiring { host: "example.com".into(), days: 5 };
        assert_eq!(alert.to_string(), "⚠️ SSL for *example.com* expires in 5 day(s)");
        assert!(!alert.is_transition());
    }
}
