//! Credshim - dynamic kubelet image credential provider shim.
//!
//! Sits between the kubelet's exec-plugin interface and one or more
//! underlying credential provider binaries, routing each request to the
//! provider configured for the mirror its image resolves to.

pub mod adapter;
pub mod install;
