//! Credshim Dispatch - dynamic credential provider routing.
//!
//! Maps an image pull request to the underlying credential provider that can
//! authenticate against its mirror:
//! - image reference → registry host (`reference`)
//! - registry host → ordered mirror candidates (`pattern`, `resolver`)
//! - candidate → bounded provider sub-process (`invoker`)
//! - candidates → single response (`coordinator`)

pub mod coordinator;
pub mod invoker;
pub mod pattern;
pub mod protocol;
pub mod reference;
pub mod resolver;

// Re-export commonly used types
pub use coordinator::DispatchCoordinator;
pub use invoker::{ExecInvoker, ProviderInvocation, ProviderInvoker};
pub use protocol::{AuthConfig, CredentialProviderRequest, CredentialProviderResponse};
pub use reference::ImageReference;
pub use resolver::{MirrorResolver, MirrorTarget};
