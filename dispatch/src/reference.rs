//! Image reference parsing.
//!
//! The shim only needs the registry host out of an image reference, plus the
//! ability to rewrite that host when adapting a request for a mirror.

use credshim_core::error::{Result, ShimError};

/// Default registry when the reference carries none.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host, possibly with a port (e.g. "ghcr.io", "reg.io:5000")
    pub registry: String,
    /// Repository path (e.g. "org/app")
    pub repository: String,
    /// Tag (e.g. "latest", "v1.2.0")
    pub tag: Option<String>,
    /// Digest (e.g. "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// `nginx:1.25` → docker.io/nginx:1.25,
    /// `reg.io:5000/org/app@sha256:...` → reg.io:5000/org/app@sha256:...
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ShimError::ProtocolError(
                "Empty image reference".to_string(),
            ));
        }

        // Digest first (@ separator)
        let (rest, digest) = match reference.rsplit_once('@') {
            Some((rest, digest)) => {
                if !digest.contains(':') {
                    return Err(ShimError::ProtocolError(format!(
                        "Invalid digest in reference '{}': expected algorithm:hex",
                        reference
                    )));
                }
                (rest, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // Registry is the first component when it looks like a hostname.
        let (registry, remainder) = match rest.split_once('/') {
            Some((first, remainder))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                if remainder.is_empty() {
                    return Err(ShimError::ProtocolError(format!(
                        "Empty repository in reference '{}'",
                        reference
                    )));
                }
                (first.to_string(), remainder)
            }
            _ => (DEFAULT_REGISTRY.to_string(), rest),
        };

        // Tag is after the last colon of the last path segment. With the
        // registry already split off, a remaining colon cannot be a port.
        let (repository, tag) = match remainder.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => {
                (repo.to_string(), Some(tag.to_string()))
            }
            _ => (remainder.to_string(), None),
        };

        if repository.is_empty() {
            return Err(ShimError::ProtocolError(format!(
                "Empty repository in reference '{}'",
                reference
            )));
        }

        let tag = match (&tag, &digest) {
            (None, None) => Some("latest".to_string()),
            _ => tag,
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// The same reference pointed at a different registry host. Used to
    /// adapt a request for the mirror endpoint it resolved to.
    pub fn with_registry(&self, registry: &str) -> Self {
        Self {
            registry: registry.to_string(),
            ..self.clone()
        }
    }

    /// Full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(tag) = &self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}
