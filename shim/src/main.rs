//! Credshim binary - dynamic kubelet image credential provider shim.
//!
//! Invoked by the kubelet once per image pull needing credentials: one JSON
//! request on stdin, one JSON response on stdout, diagnostics on stderr.
//! Exit 0 means a well-formed response was written (even a credential-less
//! one); non-zero means the shim itself failed.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use credshim::{adapter, install};
use credshim_core::config::DynamicCredentialProviderConfig;

/// Default location of the shim's own configuration file.
const DEFAULT_SHIM_CONFIG: &str = "/etc/credshim/config.yaml";

/// Dynamic image credential provider shim
#[derive(Parser)]
#[command(name = "credshim", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve one credential request over stdin/stdout (exec-plugin mode)
    GetCredentials(GetCredentialsArgs),
    /// Install the shim binary and kubelet provider config
    Install(InstallArgs),
}

#[derive(Args)]
struct GetCredentialsArgs {
    /// Path to the shim configuration file
    #[arg(long, default_value = DEFAULT_SHIM_CONFIG)]
    config: PathBuf,
}

#[derive(Args)]
struct InstallArgs {
    /// Directory the kubelet scans for credential provider binaries
    #[arg(long, default_value = "/etc/kubernetes/image-credential-provider/bin")]
    bin_dir: PathBuf,

    /// Path of the kubelet CredentialProviderConfig to write
    #[arg(long, default_value = "/etc/kubernetes/image-credential-provider/config.yaml")]
    config_path: PathBuf,

    /// Shim configuration path baked into the kubelet stanza
    #[arg(long, default_value = DEFAULT_SHIM_CONFIG)]
    shim_config: PathBuf,
}

#[tokio::main]
async fn main() {
    // stdout carries the protocol; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::GetCredentials(GetCredentialsArgs {
        config: PathBuf::from(DEFAULT_SHIM_CONFIG),
    }));

    match command {
        Command::GetCredentials(args) => {
            std::process::exit(get_credentials(&args.config).await);
        }
        Command::Install(args) => {
            if let Err(e) = install::install(&args.bin_dir, &args.config_path, &args.shim_config) {
                tracing::error!(error = %e, "Install failed");
                std::process::exit(1);
            }
        }
    }
}

/// Serve one request; the returned code becomes the process exit status.
async fn get_credentials(config_path: &Path) -> i32 {
    let config = match DynamicCredentialProviderConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_path.display(), error = %e, "Configuration error");
            return 1;
        }
    };

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    match adapter::run(&config, stdin.lock(), stdout.lock()).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "Shim failed");
            1
        }
    }
}
