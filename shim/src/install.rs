//! Shim installation into the kubelet plugin directory.
//!
//! Copies the running executable into the image-credential-provider bin
//! directory and writes a kubelet `CredentialProviderConfig` stanza that
//! points at it, so the kubelet discovers the shim on its next start.
//! Re-running overwrites both; the config write is atomic (tmp + rename).

use std::path::{Path, PathBuf};

use credshim_core::error::{Result, ShimError};
use serde::{Deserialize, Serialize};

/// File name of the installed shim binary.
pub const SHIM_BINARY_NAME: &str = "credshim";

/// kubelet CredentialProviderConfig apiVersion written by the installer.
const KUBELET_CONFIG_API_VERSION: &str = "kubelet.config.k8s.io/v1";

/// Provider apiVersion the kubelet should use when calling the shim.
const PLUGIN_API_VERSION: &str = "credentialprovider.kubelet.k8s.io/v1";

/// matchImages globs routing every registry through the shim; the shim's
/// own mirror table does the real selection.
const MATCH_ALL_IMAGES: [&str; 6] = ["*", "*.*", "*.*.*", "*.*.*.*", "*.*.*.*.*", "*:*"];

/// kubelet-side provider discovery document.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeletCredentialProviderConfig {
    pub api_version: String,
    pub kind: String,
    pub providers: Vec<KubeletProviderEntry>,
}

/// One provider entry in the kubelet discovery document.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeletProviderEntry {
    pub name: String,
    pub match_images: Vec<String>,
    pub default_cache_duration: String,
    pub api_version: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Install the shim binary into `bin_dir` and write the kubelet provider
/// config at `config_path`, baking `shim_config` into the plugin args.
/// Returns the path of the installed binary.
pub fn install(bin_dir: &Path, config_path: &Path, shim_config: &Path) -> Result<PathBuf> {
    let source = std::env::current_exe().map_err(|e| {
        ShimError::ConfigError(format!("Cannot determine current executable: {}", e))
    })?;

    std::fs::create_dir_all(bin_dir)?;
    let target = bin_dir.join(SHIM_BINARY_NAME);
    std::fs::copy(&source, &target)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))?;
    }
    tracing::info!(
        source = %source.display(),
        target = %target.display(),
        "Installed shim binary"
    );

    let config = kubelet_config(shim_config);
    write_atomic(config_path, &serde_yaml::to_string(&config)?)?;
    tracing::info!(config = %config_path.display(), "Wrote kubelet provider config");

    Ok(target)
}

/// The discovery stanza the kubelet needs to route pulls through the shim.
fn kubelet_config(shim_config: &Path) -> KubeletCredentialProviderConfig {
    KubeletCredentialProviderConfig {
        api_version: KUBELET_CONFIG_API_VERSION.to_string(),
        kind: "CredentialProviderConfig".to_string(),
        providers: vec![KubeletProviderEntry {
            name: SHIM_BINARY_NAME.to_string(),
            match_images: MATCH_ALL_IMAGES.iter().map(|s| s.to_string()).collect(),
            default_cache_duration: "0s".to_string(),
            api_version: PLUGIN_API_VERSION.to_string(),
            args: vec![
                "get-credentials".to_string(),
                "--config".to_string(),
                shim_config.display().to_string(),
            ],
        }],
    }
}

/// Write a file atomically: write to a tmp sibling, then rename over.
fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_install(dir: &TempDir) -> (PathBuf, PathBuf) {
        let bin_dir = dir.path().join("bin");
        let config_path = dir.path().join("config.yaml");
        let installed = install(&bin_dir, &config_path, Path::new("/etc/credshim/config.yaml"))
            .unwrap();
        (installed, config_path)
    }

    #[test]
    fn test_install_copies_binary() {
        let dir = TempDir::new().unwrap();
        let (installed, _) = run_install(&dir);
        assert!(installed.exists());
        assert_eq!(installed.file_name().unwrap(), SHIM_BINARY_NAME);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&installed).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_install_writes_parseable_kubelet_config() {
        let dir = TempDir::new().unwrap();
        let (_, config_path) = run_install(&dir);

        let parsed: KubeletCredentialProviderConfig =
            serde_yaml::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(parsed.kind, "CredentialProviderConfig");
        assert_eq!(parsed.providers.len(), 1);

        let provider = &parsed.providers[0];
        assert_eq!(provider.name, SHIM_BINARY_NAME);
        assert!(provider.match_images.contains(&"*".to_string()));
        assert_eq!(
            provider.args,
            vec!["get-credentials", "--config", "/etc/credshim/config.yaml"]
        );
    }

    #[test]
    fn test_install_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (first, config_path) = run_install(&dir);
        let first_config = std::fs::read_to_string(&config_path).unwrap();

        let (second, _) = run_install(&dir);
        assert_eq!(first, second);
        assert_eq!(first_config, std::fs::read_to_string(&config_path).unwrap());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let (_, config_path) = run_install(&dir);
        assert!(!config_path.with_extension("tmp").exists());
    }
}
