//! Dispatch coordination across mirror candidates.
//!
//! Candidates are attempted sequentially in specificity order under a shared
//! deadline. A failing candidate is recorded and skipped; the request only
//! comes back empty when every viable path has been exhausted. "No
//! credentials" is a legitimate outcome, not an error.

use std::time::{Duration, Instant};

use credshim_core::config::{DynamicCredentialProviderConfig, MergePolicy, ProviderSpec};
use credshim_core::error::{Result, ShimError};

use crate::invoker::{ProviderInvocation, ProviderInvoker};
use crate::protocol::{CredentialProviderRequest, CredentialProviderResponse, RESPONSE_KIND};
use crate::reference::ImageReference;
use crate::resolver::MirrorResolver;

/// Orchestrates mirror resolution and provider invocation for one request.
pub struct DispatchCoordinator<I: ProviderInvoker> {
    resolver: MirrorResolver,
    invoker: I,
    merge_policy: MergePolicy,
    overall_timeout: Duration,
}

impl<I: ProviderInvoker> DispatchCoordinator<I> {
    /// Build the coordinator from a defaulted configuration. Pattern
    /// validation happens here, before any request is read.
    pub fn new(config: &DynamicCredentialProviderConfig, invoker: I) -> Result<Self> {
        Ok(Self {
            resolver: MirrorResolver::new(config)?,
            invoker,
            merge_policy: config.merge_policy(),
            overall_timeout: Duration::from_secs(config.timeout_seconds()),
        })
    }

    /// Resolve one request to a single response.
    ///
    /// Recoverable per-candidate failures are logged and skipped; a
    /// malformed image reference or a non-recoverable error is fatal. The
    /// sum of per-candidate budgets never exceeds the overall deadline.
    pub async fn resolve(
        &self,
        request: &CredentialProviderRequest,
    ) -> Result<CredentialProviderResponse> {
        let reference = ImageReference::parse(&request.image)?;
        let host = reference.registry.clone();
        let candidates = self.resolver.resolve(&host);
        let deadline = Instant::now() + self.overall_timeout;
        let mut attempts: Vec<ProviderInvocation> = Vec::new();
        let mut merged: Option<CredentialProviderResponse> = None;

        tracing::debug!(
            host = %host,
            candidates = candidates.len(),
            policy = ?self.merge_policy,
            "Dispatching credential request"
        );

        for target in &candidates {
            let Some(budget) = budget_within(deadline, &target.provider) else {
                tracing::warn!(
                    host = %host,
                    pattern = %target.pattern,
                    "Overall deadline exhausted, remaining candidates skipped"
                );
                break;
            };

            let adapted_image = reference.with_registry(&target.endpoint).full_reference();
            let adapted = request.with_image(&adapted_image);
            let started = Instant::now();
            let result = self.invoker.invoke(&target.provider, &adapted, budget).await;
            let attempt = ProviderInvocation {
                provider: target.provider.provider_path.display().to_string(),
                endpoint: Some(target.endpoint.clone()),
                elapsed: started.elapsed(),
                outcome: ProviderInvocation::outcome_of(&result),
            };
            attempt.log();
            attempts.push(attempt);

            match result {
                Ok(response) if response.has_credentials() => {
                    tracing::info!(
                        host = %host,
                        endpoint = %target.endpoint,
                        pattern = %target.pattern,
                        "Credentials obtained"
                    );
                    match self.merge_policy {
                        MergePolicy::FirstSuccess => {
                            return Ok(finalize(request, response));
                        }
                        MergePolicy::Union => merge_into(&mut merged, response),
                    }
                }
                Ok(_) => {
                    tracing::debug!(
                        endpoint = %target.endpoint,
                        "Candidate returned no credentials, trying next"
                    );
                }
                Err(e) if e.is_recoverable() => log_candidate_failure(&target.endpoint, &e),
                Err(e) => return Err(e),
            }
        }

        if let Some(response) = merged {
            return Ok(finalize(request, response));
        }

        // No candidate produced credentials; consult the default provider
        // with the original, un-rewritten image.
        if let Some(default_spec) = self.resolver.default_provider() {
            if let Some(budget) = budget_within(deadline, default_spec) {
                let started = Instant::now();
                let result = self.invoker.invoke(default_spec, request, budget).await;
                let attempt = ProviderInvocation {
                    provider: default_spec.provider_path.display().to_string(),
                    endpoint: None,
                    elapsed: started.elapsed(),
                    outcome: ProviderInvocation::outcome_of(&result),
                };
                attempt.log();
                attempts.push(attempt);
                match result {
                    Ok(response) if response.has_credentials() => {
                        tracing::info!(host = %host, "Credentials obtained from default provider");
                        return Ok(finalize(request, response));
                    }
                    Ok(_) => {
                        tracing::debug!(host = %host, "Default provider returned no credentials");
                    }
                    Err(e) if e.is_recoverable() => log_candidate_failure("default", &e),
                    Err(e) => return Err(e),
                }
            } else {
                tracing::warn!(host = %host, "Deadline exhausted before default provider");
            }
        }

        tracing::info!(
            host = %host,
            attempts = attempts.len(),
            "No credentials available"
        );
        Ok(CredentialProviderResponse::empty(&request.api_version))
    }
}

/// Remaining per-candidate budget, clamped to the overall deadline.
/// `None` once the deadline has passed.
fn budget_within(deadline: Instant, provider: &ProviderSpec) -> Option<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return None;
    }
    Some(remaining.min(Duration::from_secs(provider.timeout_seconds())))
}

/// Normalize a provider response for the host runtime: the kind is fixed
/// and the apiVersion echoes the inbound request.
fn finalize(
    request: &CredentialProviderRequest,
    mut response: CredentialProviderResponse,
) -> CredentialProviderResponse {
    response.kind = RESPONSE_KIND.to_string();
    response.api_version = request.api_version.clone();
    response
}

/// Union-merge: earlier (more specific) contributors win on key conflicts;
/// the cache hint is the shortest one offered.
fn merge_into(
    accumulator: &mut Option<CredentialProviderResponse>,
    next: CredentialProviderResponse,
) {
    match accumulator {
        None => *accumulator = Some(next),
        Some(acc) => {
            for (key, auth) in next.auth {
                acc.auth.entry(key).or_insert(auth);
            }
            acc.cache_duration =
                min_cache_duration(acc.cache_duration.take(), next.cache_duration);
        }
    }
}

fn log_candidate_failure(endpoint: &str, error: &ShimError) {
    match error {
        ShimError::ProviderError {
            provider,
            exit_code,
            stderr,
        } => {
            tracing::warn!(
                endpoint = %endpoint,
                provider = %provider,
                exit_code = exit_code,
                stderr = %stderr,
                "Provider failed, trying next candidate"
            );
        }
        other => {
            tracing::warn!(
                endpoint = %endpoint,
                error = %other,
                "Candidate failed, trying next"
            );
        }
    }
}

/// Pick the smaller of two Go-style duration strings. Unparseable hints
/// fall back to the first contributor's value.
fn min_cache_duration(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => match (parse_duration_millis(&a), parse_duration_millis(&b)) {
            (Some(da), Some(db)) if db < da => Some(b),
            (Some(_), Some(_)) => Some(a),
            _ => Some(a),
        },
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Parse a simple single-unit Go duration ("150ms", "30s", "5m", "2h").
fn parse_duration_millis(s: &str) -> Option<u64> {
    let (value, factor) = if let Some(v) = s.strip_suffix("ms") {
        (v, 1)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1_000)
    } else if let Some(v) = s.strip_suffix('m') {
        (v, 60_000)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3_600_000)
    } else {
        return None;
    };
    value.parse::<u64>().ok().map(|v| v * factor)
}
