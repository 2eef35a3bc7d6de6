//! Typed configuration for the dynamic credential provider shim.
//!
//! The on-disk document is YAML (or JSON), loaded once at process start and
//! immutable thereafter. Defaulting is a single explicit walk over the typed
//! tree: every unset optional field receives its default exactly once before
//! the dispatch layer ever sees the configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShimError};

/// Expected `kind` discriminator of the configuration document.
pub const CONFIG_KIND: &str = "DynamicCredentialProviderConfig";

/// apiVersion of the configuration document.
pub const CONFIG_API_VERSION: &str = "credentialprovider.shim.io/v1alpha1";

/// Default overall deadline for one shim invocation: 30 seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Default per-provider invocation timeout: 10 seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicCredentialProviderConfig {
    /// Document kind (must be `DynamicCredentialProviderConfig` if set).
    #[serde(default)]
    pub kind: Option<String>,

    /// Document apiVersion.
    #[serde(default)]
    pub api_version: Option<String>,

    /// Mirror routing table. Absent means no mirrors are configured.
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,

    /// Overall deadline for one invocation, in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Policy for combining responses when multiple mirrors match.
    #[serde(default)]
    pub merge_policy: Option<MergePolicy>,
}

/// Ordered mirror routing table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    /// Ordered list of mirror endpoints. Configuration order is the final
    /// tie-break when two patterns are equally specific.
    #[serde(default)]
    pub endpoints: Vec<MirrorEndpoint>,

    /// Provider consulted when no pattern matches, or when every matching
    /// candidate fails.
    #[serde(default)]
    pub default_provider: Option<ProviderSpec>,
}

/// One mirror endpoint: a host pattern, the registry it redirects to, and
/// the credential provider that can authenticate against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MirrorEndpoint {
    /// Host pattern matched against the image reference's registry host
    /// (e.g. `registry.example.com:5000` or `*.example.com`).
    pub pattern: String,

    /// Target registry endpoint the credentials are for.
    pub endpoint: String,

    /// Underlying credential provider for this endpoint.
    #[serde(flatten)]
    pub provider: ProviderSpec,
}

/// Invocation parameters for one underlying credential provider binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Path to the provider executable.
    pub provider_path: PathBuf,

    /// Arguments passed to the provider.
    #[serde(default)]
    pub provider_args: Vec<String>,

    /// Per-invocation timeout for this provider, in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl ProviderSpec {
    /// Effective timeout, after defaulting.
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECONDS)
    }
}

/// Policy for combining responses when multiple mirrors match a host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Stop at the first candidate that returns a non-empty credential set.
    #[default]
    FirstSuccess,
    /// Invoke every matching candidate and union the credential sets,
    /// most-specific candidate winning on key conflicts.
    Union,
}

impl Default for DynamicCredentialProviderConfig {
    fn default() -> Self {
        let mut config = Self {
            kind: None,
            api_version: None,
            mirror: None,
            timeout_seconds: None,
            merge_policy: None,
        };
        config.apply_defaults();
        config
    }
}

impl DynamicCredentialProviderConfig {
    /// Load a configuration document from disk, apply defaults, and
    /// validate it. `.json` files are parsed as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ShimError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&data).map_err(|e| {
                ShimError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
            })?
        } else {
            serde_yaml::from_str(&data).map_err(|e| {
                ShimError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
            })?
        };

        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Fill every unset optional field with its default, recursively.
    ///
    /// This is the single defaulting pass for the whole document tree;
    /// nothing downstream re-applies defaults.
    pub fn apply_defaults(&mut self) {
        if self.kind.is_none() {
            self.kind = Some(CONFIG_KIND.to_string());
        }
        if self.api_version.is_none() {
            self.api_version = Some(CONFIG_API_VERSION.to_string());
        }
        if self.timeout_seconds.is_none() {
            self.timeout_seconds = Some(DEFAULT_TIMEOUT_SECONDS);
        }
        if self.merge_policy.is_none() {
            self.merge_policy = Some(MergePolicy::default());
        }
        if let Some(mirror) = &mut self.mirror {
            for endpoint in &mut mirror.endpoints {
                if endpoint.provider.timeout_seconds.is_none() {
                    endpoint.provider.timeout_seconds = Some(DEFAULT_PROVIDER_TIMEOUT_SECONDS);
                }
            }
            if let Some(default_provider) = &mut mirror.default_provider {
                if default_provider.timeout_seconds.is_none() {
                    default_provider.timeout_seconds = Some(DEFAULT_PROVIDER_TIMEOUT_SECONDS);
                }
            }
        }
    }

    /// Structural validation. Pattern syntax is checked when the mirror
    /// resolver is built, before any request is read.
    pub fn validate(&self) -> Result<()> {
        if let Some(kind) = &self.kind {
            if kind != CONFIG_KIND {
                return Err(ShimError::ConfigError(format!(
                    "Unexpected config kind '{}', expected '{}'",
                    kind, CONFIG_KIND
                )));
            }
        }

        if let Some(mirror) = &self.mirror {
            for (i, endpoint) in mirror.endpoints.iter().enumerate() {
                if endpoint.pattern.is_empty() {
                    return Err(ShimError::ConfigError(format!(
                        "mirror.endpoints[{}]: empty pattern",
                        i
                    )));
                }
                if endpoint.endpoint.is_empty() {
                    return Err(ShimError::ConfigError(format!(
                        "mirror.endpoints[{}]: empty endpoint",
                        i
                    )));
                }
                if endpoint.provider.provider_path.as_os_str().is_empty() {
                    return Err(ShimError::ConfigError(format!(
                        "mirror.endpoints[{}]: empty providerPath",
                        i
                    )));
                }
            }
            if let Some(default_provider) = &mirror.default_provider {
                if default_provider.provider_path.as_os_str().is_empty() {
                    return Err(ShimError::ConfigError(
                        "mirror.defaultProvider: empty providerPath".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Effective overall deadline, after defaulting.
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }

    /// Effective merge policy, after defaulting.
    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy.unwrap_or_default()
    }
}
