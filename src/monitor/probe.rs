//! Bounded-time HTTP(S) liveness probe.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use tracing::debug;

use super::outcome::CheckOutcome;

/// Hard ceiling for a single probe, also used when a target asks for 0.
pub const MAX_PROBE_TIMEOUT_SECONDS: u32 = 30;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ProbeSetupError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Runs one outbound check. Implementations never fail: every reachable error
/// is folded into the returned `CheckOutcome`.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn check(&self, url: &str, timeout_seconds: u32) -> CheckOutcome;
}

pub fn effective_timeout_seconds(requested: u32) -> u32 {
    if requested == 0 {
        MAX_PROBE_TIMEOUT_SECONDS
    } else {
        requested.min(MAX_PROBE_TIMEOUT_SECONDS)
    }
}

pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(user_agent: &str) -> Result<Self, ProbeSetupError> {
        Self::build(user_agent, true)
    }

    /// Ignores `HTTP_PROXY` and friends.
    pub fn without_proxy(user_agent: &str) -> Result<Self, ProbeSetupError> {
        Self::build(user_agent, false)
    }

    fn build(user_agent: &str, use_system_proxy: bool) -> Result<Self, ProbeSetupError> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));
        if !use_system_proxy {
            builder = builder.no_proxy();
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl ProbeExecutor for HttpProbe {
    async fn check(&self, url: &str, timeout_seconds: u32) -> CheckOutcome {
        let timeout = effective_timeout_seconds(timeout_seconds);
        let start_time = Instant::now();
        let result = self
            .client
            .get(url)
            .timeout(Duration::from_secs(u64::from(timeout)))
            .send()
            .await;

        match result {
            Ok(response) => {
                let response_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;
                CheckOutcome::from_status(response.status().as_u16(), response_time_ms)
            }
            Err(e) => {
                let outcome = classify_transport_error(e.is_timeout(), e.is_connect(), &e, timeout);
                debug!(url = url, error = %e, kind = %outcome.kind(), "Probe failed.");
                outcome
            }
        }
    }
}

fn error_chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

// io::Error::source skips the wrapped error, so look inside explicitly.
fn is_tls_failure(err: &(dyn StdError + 'static)) -> bool {
    error_chain(err).any(|e| {
        if e.is::<rustls::Error>() {
            return true;
        }
        if let Some(inner) = e
            .downcast_ref::<std::io::Error>()
            .and_then(|io| io.get_ref())
        {
            if inner.is::<rustls::Error>() {
                return true;
            }
        }
        e.to_string().contains("certificate")
    })
}

fn is_dns_failure(err: &(dyn StdError + 'static)) -> bool {
    error_chain(err).any(|e| {
        let message = e.to_string();
        message.contains("dns error") || message.contains("failed to lookup address")
    })
}

fn root_cause(err: &(dyn StdError + 'static)) -> String {
    error_chain(err)
        .last()
        .map(|e| e.to_string())
        .unwrap_or_default()
}

/// Maps a transport error onto an outcome class. Order matters: a TLS
/// handshake failure is also reported as a connect error.
pub(crate) fn classify_transport_error(
    is_timeout: bool,
    is_connect: bool,
    err: &(dyn StdError + 'static),
    timeout_seconds: u32,
) -> CheckOutcome {
    if is_timeout {
        return CheckOutcome::Timeout {
            after_seconds: timeout_seconds,
        };
    }
    if is_tls_failure(err) {
        return CheckOutcome::Tls;
    }
    if is_connect {
        if is_dns_failure(err) {
            return CheckOutcome::Dns;
        }
        return CheckOutcome::Connection {
            detail: root_cause(err),
        };
    }
    CheckOutcome::Unexpected {
        detail: err.to_string(),
    }
}
