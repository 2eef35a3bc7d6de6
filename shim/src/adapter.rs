//! Exec-plugin protocol adapter.
//!
//! Decodes exactly one request from the inbound channel, runs the dispatch
//! coordinator, and encodes exactly one response to the outbound channel.
//! An `Err` from here means the shim itself malfunctioned and the process
//! must exit non-zero without a response body; the "no credentials" outcome
//! is an `Ok` with an empty auth map.

use std::io::{Read, Write};

use credshim_core::config::DynamicCredentialProviderConfig;
use credshim_core::error::{Result, ShimError};
use credshim_dispatch::{CredentialProviderRequest, DispatchCoordinator, ExecInvoker};

/// Serve one credential request: `input` carries the JSON request, the JSON
/// response is written to `output`.
pub async fn run<R: Read, W: Write>(
    config: &DynamicCredentialProviderConfig,
    mut input: R,
    mut output: W,
) -> Result<()> {
    // Built before the request is read so a bad config fails fast.
    let coordinator = DispatchCoordinator::new(config, ExecInvoker::new())?;

    let mut raw = String::new();
    input.read_to_string(&mut raw)?;
    let request: CredentialProviderRequest = serde_json::from_str(&raw)
        .map_err(|e| ShimError::ProtocolError(format!("Failed to decode request: {}", e)))?;
    request.validate()?;

    tracing::info!(
        image = %request.image,
        api_version = %request.api_version,
        "Handling credential request"
    );

    let response = coordinator.resolve(&request).await?;

    serde_json::to_writer(&mut output, &response)?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use credshim_dispatch::CredentialProviderResponse;
    use std::io::Cursor;

    const V1: &str = "credentialprovider.kubelet.k8s.io/v1";

    fn serve(config: &DynamicCredentialProviderConfig, request_json: &str) -> (Result<()>, Vec<u8>) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let mut output = Vec::new();
        let result = runtime.block_on(run(
            config,
            Cursor::new(request_json.as_bytes().to_vec()),
            &mut output,
        ));
        (result, output)
    }

    #[test]
    fn test_no_mirrors_yields_credentialless_response() {
        let config = DynamicCredentialProviderConfig::default();
        let request = format!(
            r#"{{"kind":"CredentialProviderRequest","apiVersion":"{}","image":"quay.io/org/app:v1"}}"#,
            V1
        );
        let (result, output) = serve(&config, &request);
        assert!(result.is_ok());

        let response: CredentialProviderResponse = serde_json::from_slice(&output).unwrap();
        assert!(!response.has_credentials());
        assert_eq!(response.api_version, V1);
        assert!(output.ends_with(b"\n"));
    }

    #[test]
    fn test_unsupported_api_version_is_fatal_without_body() {
        let config = DynamicCredentialProviderConfig::default();
        let request = r#"{"kind":"CredentialProviderRequest","apiVersion":"credentialprovider.kubelet.k8s.io/v99","image":"nginx"}"#;
        let (result, output) = serve(&config, request);
        assert!(matches!(result, Err(ShimError::ProtocolError(_))));
        assert!(output.is_empty());
    }

    #[test]
    fn test_undecodable_request_is_fatal_without_body() {
        let config = DynamicCredentialProviderConfig::default();
        let (result, output) = serve(&config, "this is not json");
        assert!(matches!(result, Err(ShimError::ProtocolError(_))));
        assert!(output.is_empty());
    }

    #[test]
    fn test_bad_config_fails_before_reading_request() {
        let mut config = DynamicCredentialProviderConfig::default();
        config.mirror = Some(credshim_core::config::MirrorConfig {
            endpoints: vec![credshim_core::config::MirrorEndpoint {
                pattern: "reg.*.bad".to_string(),
                endpoint: "mirror.io".to_string(),
                provider: credshim_core::config::ProviderSpec {
                    provider_path: "/p".into(),
                    provider_args: vec![],
                    timeout_seconds: Some(10),
                },
            }],
            default_provider: None,
        });
        let (result, output) = serve(&config, "never parsed");
        assert!(matches!(result, Err(ShimError::ConfigError(_))));
        assert!(output.is_empty());
    }
}
