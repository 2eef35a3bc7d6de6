//! Bounded sub-process invocation of underlying credential providers.
//!
//! One fresh process per invocation, no pooling: the host runtime's call
//! cadence is infrequent and each evaluation must be isolated. The request
//! travels over the child's stdin, the response comes back on its stdout,
//! diagnostics on its stderr, all under a hard timeout.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use credshim_core::config::ProviderSpec;
use credshim_core::error::{Result, ShimError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::protocol::{CredentialProviderRequest, CredentialProviderResponse};

/// Ephemeral record of one provider invocation attempt, kept only for the
/// duration of a dispatch and used for structured logging.
#[derive(Debug, Clone)]
pub struct ProviderInvocation {
    /// Display name of the provider binary.
    pub provider: String,
    /// Mirror endpoint being attempted, if any.
    pub endpoint: Option<String>,
    /// Time spent in the attempt.
    pub elapsed: Duration,
    /// "success", "timeout", "exec", "provider", or "protocol".
    pub outcome: &'static str,
}

impl ProviderInvocation {
    /// Emit the structured per-attempt event.
    pub fn log(&self) {
        tracing::debug!(
            provider = %self.provider,
            endpoint = self.endpoint.as_deref().unwrap_or("default"),
            elapsed_ms = self.elapsed.as_millis() as u64,
            outcome = self.outcome,
            "Provider attempt finished"
        );
    }

    pub fn outcome_of(result: &Result<CredentialProviderResponse>) -> &'static str {
        match result {
            Ok(_) => "success",
            Err(ShimError::TimeoutError { .. }) => "timeout",
            Err(ShimError::ExecError { .. }) => "exec",
            Err(ShimError::ProviderError { .. }) => "provider",
            Err(ShimError::ProtocolError(_)) => "protocol",
            Err(_) => "error",
        }
    }
}

/// Seam between the dispatch coordinator and the actual sub-process
/// machinery, so coordination policy is testable without spawning anything.
#[async_trait]
pub trait ProviderInvoker: Send + Sync {
    /// Run one provider with `request` on its stdin, bounded by `timeout`.
    async fn invoke(
        &self,
        provider: &ProviderSpec,
        request: &CredentialProviderRequest,
        timeout: Duration,
    ) -> Result<CredentialProviderResponse>;
}

/// Production invoker: spawns the provider binary as a child process.
#[derive(Debug, Default, Clone)]
pub struct ExecInvoker;

impl ExecInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProviderInvoker for ExecInvoker {
    async fn invoke(
        &self,
        provider: &ProviderSpec,
        request: &CredentialProviderRequest,
        timeout: Duration,
    ) -> Result<CredentialProviderResponse> {
        let name = provider.provider_path.display().to_string();
        let payload = serde_json::to_vec(request)?;
        let started = Instant::now();

        let mut child = Command::new(&provider.provider_path)
            .args(&provider.provider_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The child must not outlive the deadline: dropping the wait
            // future on timeout kills it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ShimError::ExecError {
                provider: name.clone(),
                message: e.to_string(),
            })?;

        // The stdin write sits under the same deadline as the wait: a
        // provider that never drains its stdin must not stall past the
        // budget on a payload larger than the pipe buffer.
        let run = async {
            if let Some(mut stdin) = child.stdin.take() {
                // A provider that exits without reading its stdin closes
                // the pipe; its exit status decides the outcome, not this
                // write.
                if let Err(e) = stdin.write_all(&payload).await {
                    tracing::debug!(provider = %name, error = %e, "Short write to provider stdin");
                }
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ShimError::ExecError {
                    provider: name,
                    message: format!("Failed to collect provider output: {}", e),
                });
            }
            Err(_) => {
                tracing::warn!(
                    provider = %name,
                    timeout_secs = timeout.as_secs_f64(),
                    "Provider timed out, killing"
                );
                return Err(ShimError::TimeoutError {
                    provider: name,
                    timeout_seconds: timeout.as_secs(),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ShimError::ProviderError {
                provider: name,
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }
        if !stderr.is_empty() {
            tracing::debug!(provider = %name, stderr = %stderr, "Provider diagnostics");
        }

        let response: CredentialProviderResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| {
                ShimError::ProtocolError(format!(
                    "Provider {} emitted an invalid response: {}",
                    name, e
                ))
            })?;
        response.validate()?;

        tracing::debug!(
            provider = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            entries = response.auth.len(),
            "Provider responded"
        );
        Ok(response)
    }
}
