//! The request seam: one probe is one attempt against the target.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::config::TargetConfig;

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The target answered with a status line.
    Response { status: u16 },
    /// No status was received.
    Failed { reason: String },
}

impl ProbeOutcome {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProbeOutcome::Response { status } => Some(*status),
            ProbeOutcome::Failed { .. } => None,
        }
    }
}

#[async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Issue one request. Never retries.
    async fn probe(&self) -> ProbeOutcome;

    /// Path reported in diagnostics.
    fn path(&self) -> &str;
}

/// HTTP GET against the configured target.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: Url,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(target: &TargetConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .danger_accept_invalid_certs(target.insecure_skip_tls_verify)
            .user_agent(concat!("rampload/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: target.url(),
            path: target.path.clone(),
            timeout: target.timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self) -> ProbeOutcome {
        let request = self.client.get(self.url.clone()).timeout(self.timeout);
        match request.send().await {
            // Read errors after the status line do not change the outcome.
            Ok(response) => {
                let status = response.status().as_u16();
                let _ = response.bytes().await;
                ProbeOutcome::Response { status }
            }
            Err(e) => ProbeOutcome::Failed {
                reason: if e.is_timeout() {
                    format!("timed out after {:?}", self.timeout)
                } else {
                    e.to_string()
                },
            },
        }
    }

    fn path(&self) -> &str {
        &self.path
    }
}
