use crate::db::enums::CheckOutcomeKind;

/// Classification of one probe. Every failure the probe can hit maps to one
/// variant; only a completed HTTP exchange carries a status code and latency.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Healthy { status_code: u16, response_time_ms: f64 },
    Unhealthy { status_code: u16, response_time_ms: f64 },
    Timeout { after_seconds: u32 },
    Tls,
    Dns,
    Connection { detail: String },
    Unexpected { detail: String },
}

impl CheckOutcome {
    /// Healthy iff a response arrived with a status in [200, 400).
    pub fn from_status(status_code: u16, response_time_ms: f64) -> Self {
        if (200..400).contains(&status_code) {
            CheckOutcome::Healthy {
                status_code,
                response_time_ms,
            }
        } else {
            CheckOutcome::Unhealthy {
                status_code,
                response_time_ms,
            }
        }
    }

    pub fn kind(&self) -> CheckOutcomeKind {
        match self {
            CheckOutcome::Healthy { .. } => CheckOutcomeKind::Healthy,
            CheckOutcome::Unhealthy { .. } => CheckOutcomeKind::Unhealthy,
            CheckOutcome::Timeout { .. } => CheckOutcomeKind::Timeout,
            CheckOutcome::Tls => CheckOutcomeKind::Tls,
            CheckOutcome::Dns => CheckOutcomeKind::Dns,
            CheckOutcome::Connection { .. } => CheckOutcomeKind::Connection,
            CheckOutcome::Unexpected { .. } => CheckOutcomeKind::Unexpected,
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, CheckOutcome::Healthy { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            CheckOutcome::Healthy { status_code, .. }
            | CheckOutcome::Unhealthy { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn response_time_ms(&self) -> Option<f64> {
        match self {
            CheckOutcome::Healthy {
                response_time_ms, ..
            }
            | CheckOutcome::Unhealthy {
                response_time_ms, ..
            } => Some(*response_time_ms),
            _ => None,
        }
    }

    /// Operator-facing message. The prefix before `:` is stable per variant.
    pub fn error_message(&self) -> Option<String> {
        match self {
            CheckOutcome::Healthy { .. } => None,
            CheckOutcome::Unhealthy { status_code, .. } => {
                Some(format!("HTTPStatusError: received status {status_code}"))
            }
            CheckOutcome::Timeout { after_seconds } => Some(format!(
                "TimeoutError: request timed out after {after_seconds} seconds"
            )),
            CheckOutcome::Tls => Some("TLSError: certificate verification failed".to_string()),
            CheckOutcome::Dns => Some("DNSError: invalid domain or hostname".to_string()),
            CheckOutcome::Connection { detail } => Some(format!("ConnectionError: {detail}")),
            CheckOutcome::Unexpected { detail } => Some(format!("UnexpectedError: {detail}")),
        }
    }
}
