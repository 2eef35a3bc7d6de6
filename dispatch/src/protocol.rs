//! Kubelet exec-plugin wire types.
//!
//! One JSON `CredentialProviderRequest` arrives on stdin, one JSON
//! `CredentialProviderResponse` leaves on stdout. The same contract is used
//! on both sides of the shim: toward the host runtime and toward the
//! underlying provider binaries.

use std::collections::BTreeMap;

use credshim_core::error::{Result, ShimError};
use serde::{Deserialize, Serialize};

/// Request kind discriminator.
pub const REQUEST_KIND: &str = "CredentialProviderRequest";

/// Response kind discriminator.
pub const RESPONSE_KIND: &str = "CredentialProviderResponse";

/// API versions this shim accepts, newest first.
pub const SUPPORTED_API_VERSIONS: [&str; 3] = [
    "credentialprovider.kubelet.k8s.io/v1",
    "credentialprovider.kubelet.k8s.io/v1beta1",
    "credentialprovider.kubelet.k8s.io/v1alpha1",
];

/// Whether `version` is an apiVersion this shim speaks.
pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_API_VERSIONS.contains(&version)
}

/// Inbound exec-plugin request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProviderRequest {
    pub kind: String,
    pub api_version: String,
    /// Fully qualified image reference (e.g. "reg.example.com/org/app:v1").
    pub image: String,
    /// Opaque annotations, passed through to the underlying provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl CredentialProviderRequest {
    pub fn new(api_version: &str, image: &str) -> Self {
        Self {
            kind: REQUEST_KIND.to_string(),
            api_version: api_version.to_string(),
            image: image.to_string(),
            annotations: None,
        }
    }

    /// Validate the request against the versions this shim supports.
    /// Failures here are fatal for the whole invocation.
    pub fn validate(&self) -> Result<()> {
        if self.kind != REQUEST_KIND {
            return Err(ShimError::ProtocolError(format!(
                "Unexpected request kind '{}', expected '{}'",
                self.kind, REQUEST_KIND
            )));
        }
        if !is_supported_version(&self.api_version) {
            return Err(ShimError::ProtocolError(format!(
                "Unsupported apiVersion '{}' (supported: {})",
                self.api_version,
                SUPPORTED_API_VERSIONS.join(", ")
            )));
        }
        if self.image.is_empty() {
            return Err(ShimError::ProtocolError(
                "Request has no image reference".to_string(),
            ));
        }
        Ok(())
    }

    /// The same request with the image swapped, for a mirror candidate.
    pub fn with_image(&self, image: &str) -> Self {
        Self {
            image: image.to_string(),
            ..self.clone()
        }
    }
}

/// How the host runtime may cache the returned credentials.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CacheKeyType {
    Image,
    Registry,
    Global,
}

/// Credentials for one registry host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Bearer token, for providers that return one instead of basic auth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AuthConfig {
    pub fn basic(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            token: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty() && self.token.is_none()
    }
}

/// Outbound exec-plugin response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProviderResponse {
    pub kind: String,
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key_type: Option<CacheKeyType>,
    /// Cache hint as a duration string (e.g. "30s", "5m"), passed through
    /// from the underlying provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_duration: Option<String>,
    /// Registry host (or pattern) → credentials. BTreeMap keeps the
    /// encoded output deterministic.
    #[serde(default)]
    pub auth: BTreeMap<String, AuthConfig>,
}

impl CredentialProviderResponse {
    /// The legitimate "no credentials available" outcome: well-formed,
    /// credential-less, cacheable for zero time.
    pub fn empty(api_version: &str) -> Self {
        Self {
            kind: RESPONSE_KIND.to_string(),
            api_version: api_version.to_string(),
            cache_key_type: Some(CacheKeyType::Registry),
            cache_duration: Some("0s".to_string()),
            auth: BTreeMap::new(),
        }
    }

    /// Validate a response produced by an underlying provider. Failures
    /// here are per-candidate, not fatal for the invocation.
    pub fn validate(&self) -> Result<()> {
        if self.kind != RESPONSE_KIND {
            return Err(ShimError::ProtocolError(format!(
                "Unexpected response kind '{}', expected '{}'",
                self.kind, RESPONSE_KIND
            )));
        }
        if !is_supported_version(&self.api_version) {
            return Err(ShimError::ProtocolError(format!(
                "Provider response has unsupported apiVersion '{}'",
                self.api_version
            )));
        }
        Ok(())
    }

    /// Whether the response carries at least one usable credential entry.
    pub fn has_credentials(&self) -> bool {
        self.auth.values().any(|a| !a.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_wire_shape() {
        let req = CredentialProviderRequest::new(
            "credentialprovider.kubelet.k8s.io/v1",
            "reg.example.com/org/app:v1",
        );
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"kind\":\"CredentialProviderRequest\""));
        assert!(json.contains("\"apiVersion\":\"credentialprovider.kubelet.k8s.io/v1\""));
        assert!(json.contains("\"image\":\"reg.example.com/org/app:v1\""));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"kind":"CredentialProviderRequest","apiVersion":"credentialprovider.kubelet.k8s.io/v1","image":"nginx"}"#;
        let req: CredentialProviderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.image, "nginx");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_unsupported_version() {
        let req = CredentialProviderRequest::new("credentialprovider.kubelet.k8s.io/v2", "nginx");
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported apiVersion"));
    }

    #[test]
    fn test_request_rejects_wrong_kind() {
        let mut req =
            CredentialProviderRequest::new("credentialprovider.kubelet.k8s.io/v1", "nginx");
        req.kind = "SomethingElse".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_rejects_empty_image() {
        let req = CredentialProviderRequest::new("credentialprovider.kubelet.k8s.io/v1", "");
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_all_supported_versions_validate() {
        for version in SUPPORTED_API_VERSIONS {
            let req = CredentialProviderRequest::new(version, "nginx");
            assert!(req.validate().is_ok(), "version {} should validate", version);
        }
    }

    #[test]
    fn test_with_image() {
        let req = CredentialProviderRequest::new(
            "credentialprovider.kubelet.k8s.io/v1",
            "reg.internal.example.com/app:v1",
        );
        let adapted = req.with_image("mirror.example.com/app:v1");
        assert_eq!(adapted.image, "mirror.example.com/app:v1");
        assert_eq!(adapted.api_version, req.api_version);
    }

    #[test]
    fn test_with_image_keeps_annotations() {
        let mut req =
            CredentialProviderRequest::new("credentialprovider.kubelet.k8s.io/v1", "nginx");
        req.annotations = Some(BTreeMap::from([("team".to_string(), "infra".to_string())]));
        let adapted = req.with_image("mirror.io/nginx");
        assert_eq!(adapted.annotations, req.annotations);
        // Absent annotations never appear on the wire.
        let bare = CredentialProviderRequest::new("credentialprovider.kubelet.k8s.io/v1", "nginx");
        assert!(!serde_json::to_string(&bare).unwrap().contains("annotations"));
    }

    #[test]
    fn test_empty_response_is_well_formed() {
        let resp = CredentialProviderResponse::empty("credentialprovider.kubelet.k8s.io/v1");
        assert!(resp.validate().is_ok());
        assert!(!resp.has_credentials());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"kind\":\"CredentialProviderResponse\""));
        assert!(json.contains("\"cacheDuration\":\"0s\""));
    }

    #[test]
    fn test_response_deserialization_with_auth() {
        let json = r#"{
            "kind": "CredentialProviderResponse",
            "apiVersion": "credentialprovider.kubelet.k8s.io/v1",
            "cacheKeyType": "Registry",
            "cacheDuration": "30s",
            "auth": {
                "mirror.example.com": {"username": "u", "password": "p"}
            }
        }"#;
        let resp: CredentialProviderResponse = serde_json::from_str(json).unwrap();
        assert!(resp.validate().is_ok());
        assert!(resp.has_credentials());
        assert_eq!(
            resp.auth["mirror.example.com"],
            AuthConfig::basic("u", "p")
        );
        assert_eq!(resp.cache_key_type, Some(CacheKeyType::Registry));
    }

    #[test]
    fn test_response_rejects_wrong_kind() {
        let json = r#"{"kind":"CredentialProviderRequest","apiVersion":"credentialprovider.kubelet.k8s.io/v1"}"#;
        let resp: CredentialProviderResponse = serde_json::from_str(json).unwrap();
        assert!(resp.validate().is_err());
    }

    #[test]
    fn test_response_rejects_unsupported_version() {
        let json = r#"{"kind":"CredentialProviderResponse","apiVersion":"made.up/v9"}"#;
        let resp: CredentialProviderResponse = serde_json::from_str(json).unwrap();
        assert!(resp.validate().is_err());
    }

    #[test]
    fn test_empty_auth_entries_are_not_credentials() {
        let json = r#"{
            "kind": "CredentialProviderResponse",
            "apiVersion": "credentialprovider.kubelet.k8s.io/v1",
            "auth": {"reg.example.com": {}}
        }"#;
        let resp: CredentialProviderResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.has_credentials());
    }

    #[test]
    fn test_token_auth_counts_as_credentials() {
        let mut resp = CredentialProviderResponse::empty("credentialprovider.kubelet.k8s.io/v1");
        resp.auth.insert(
            "reg.example.com".to_string(),
            AuthConfig {
                username: String::new(),
                password: String::new(),
                token: Some("bearer-token".to_string()),
            },
        );
        assert!(resp.has_credentials());
    }

    #[test]
    fn test_auth_serialization_skips_empty_fields() {
        let auth = AuthConfig {
            username: String::new(),
            password: String::new(),
            token: Some("tok".to_string()),
        };
        let json = serde_json::to_string(&auth).unwrap();
        assert_eq!(json, r#"{"token":"tok"}"#);
    }
}
