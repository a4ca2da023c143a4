//! vmemdev client
//!
//! Loads a device, then exercises it the way a user-space test program
//! would: open, write, seek, read, close.
//!
//! Usage: `vmemdev-cli [--concurrent] [buf_size=N] [name=NAME]`

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;
use vmemdev::{Device, DeviceConfig, Registry};
use vmemdev_cli::{run_client, run_concurrent};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut params: Vec<String> = std::env::args().skip(1).collect();
    let concurrent = params.iter().any(|p| p == "--concurrent");
    params.retain(|p| p != "--concurrent");

    let config = match DeviceConfig::from_params(&params) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vmemdev-cli: {e}");
            return ExitCode::FAILURE;
        }
    };

    let registry = Arc::new(Registry::new());
    let device = match Device::init(Arc::clone(&registry), config) {
        Ok(device) => device,
        Err(e) => {
            error!("failed to load device: {e}");
            return ExitCode::FAILURE;
        }
    };
    let path = device.path();

    let mut result = run_client(&registry, &path, &mut io::stdout().lock());
    if result.is_ok() && concurrent {
        result = run_concurrent(&registry, &path).await;
    }

    device.exit();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
