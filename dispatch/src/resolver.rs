//! Mirror resolution — ordered candidate selection for a registry host.
//!
//! The resolver is built once from the loaded configuration and is read-only
//! afterwards. Resolution is a pure function of (table, host): candidates are
//! ordered exact-match first, then wildcard matches by descending literal
//! character count, then configuration order.

use credshim_core::config::{DynamicCredentialProviderConfig, ProviderSpec};
use credshim_core::error::{Result, ShimError};

use crate::pattern;

/// One row of the match table: a configured mirror endpoint with its
/// precomputed ordering keys.
#[derive(Debug, Clone)]
pub struct MirrorTarget {
    /// Host pattern this target matches.
    pub pattern: String,
    /// Registry endpoint the credentials are for.
    pub endpoint: String,
    /// Provider to invoke for this endpoint.
    pub provider: ProviderSpec,
    wildcard: bool,
    specificity: usize,
    order: usize,
}

/// Ordered matching table built from the mirror configuration.
#[derive(Debug, Clone)]
pub struct MirrorResolver {
    targets: Vec<MirrorTarget>,
    default_provider: Option<ProviderSpec>,
}

impl MirrorResolver {
    /// Build the match table. Every configured pattern is validated here,
    /// before any request is read; a bad pattern is a fatal ConfigError.
    pub fn new(config: &DynamicCredentialProviderConfig) -> Result<Self> {
        let mut targets = Vec::new();
        let mut default_provider = None;

        if let Some(mirror) = &config.mirror {
            for (order, endpoint) in mirror.endpoints.iter().enumerate() {
                pattern::validate(&endpoint.pattern).map_err(|e| {
                    ShimError::ConfigError(format!("mirror.endpoints[{}]: {}", order, e))
                })?;
                targets.push(MirrorTarget {
                    pattern: endpoint.pattern.clone(),
                    endpoint: endpoint.endpoint.clone(),
                    provider: endpoint.provider.clone(),
                    wildcard: pattern::is_wildcard(&endpoint.pattern),
                    specificity: pattern::specificity(&endpoint.pattern),
                    order,
                });
            }
            default_provider = mirror.default_provider.clone();
        }

        Ok(Self {
            targets,
            default_provider,
        })
    }

    /// All targets whose pattern matches `host`, most specific first.
    /// Returns an empty vector when nothing matches.
    pub fn resolve(&self, host: &str) -> Vec<&MirrorTarget> {
        let mut matched: Vec<&MirrorTarget> = self
            .targets
            .iter()
            .filter(|t| pattern::matches(&t.pattern, host))
            .collect();
        // Exact before wildcard, more literals before fewer, then the
        // deterministic configuration-order tie-break.
        matched.sort_by_key(|t| (t.wildcard, std::cmp::Reverse(t.specificity), t.order));
        matched
    }

    /// Provider consulted when no target matches or all candidates fail.
    pub fn default_provider(&self) -> Option<&ProviderSpec> {
        self.default_provider.as_ref()
    }

    /// Number of configured targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
