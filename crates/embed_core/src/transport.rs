use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::protocol::{CompileRequest, CompileResponse, CompiledArtifact};
use tracing::debug;

use crate::pipeline::CompileService;

/// Compile service reached over HTTP: `POST {endpoint}` with `{"source": ...}`.
///
/// No request timeout is set here; the pipeline bounds the whole call.
pub struct HttpCompileService {
    http: Client,
    endpoint: String,
}

impl HttpCompileService {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompileService for HttpCompileService {
    async fn compile(&self, request: CompileRequest) -> Result<CompiledArtifact> {
        let res = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("failed to reach compile service at {}", self.endpoint))?;
        let status = res.status();
        debug!(%status, endpoint = %self.endpoint, "compile service responded");

        let body = match res.json::<CompileResponse>().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => bail!("compile service returned {status}"),
            Err(err) => return Err(err).context("malformed compile service response"),
        };

        if let Some(error) = body.error {
            return Err(anyhow!(error));
        }
        if !status.is_success() {
            bail!("compile service returned {status}");
        }
        body.result
            .map(CompiledArtifact)
            .ok_or_else(|| anyhow!("compile service response carried neither result nor error"))
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
