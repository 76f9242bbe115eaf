//! Configuration and guest loading shared by the run commands.

use anyhow::{Context, Result};
use pankti_bridge::{
    BridgeConfig, CallBridge, HostState, ModuleLoader, OutputSurface, StreamRouting,
};
use std::path::Path;

const DEFAULT_CONFIG: &str = "pankti.yml";

/// Resolve the effective configuration.
///
/// An explicit `--config` must exist; otherwise `pankti.yml` in the working
/// directory is used when present. Command-line flags win over the file.
pub fn load_config(
    config_path: Option<&Path>,
    module: Option<&Path>,
    split_streams: bool,
) -> Result<BridgeConfig> {
    let mut config = match config_path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            tracing::debug!("Using {}", DEFAULT_CONFIG);
            BridgeConfig::from_file(DEFAULT_CONFIG).context("Failed to load configuration")?
        }
        None => BridgeConfig::default(),
    };

    // A module given on the command line is relative to the working directory
    if let Some(module) = module {
        config.module = std::path::absolute(module)
            .with_context(|| format!("Invalid module path {:?}", module))?;
    }
    if split_streams {
        config.streams = StreamRouting::Split;
    }

    Ok(config)
}

/// Load, instantiate and wrap the guest module named by `config`
pub async fn open_bridge(
    config: &BridgeConfig,
    output: impl OutputSurface + 'static,
) -> Result<CallBridge> {
    let loader = ModuleLoader::from_config(config).context("Failed to create module loader")?;

    let path = config.module_path();
    let module = loader
        .load(&path)
        .await
        .with_context(|| format!("Failed to load guest module {:?}", path))?;

    let instance = loader
        .instantiate(&module, HostState::new(output))
        .context("Failed to instantiate guest module")?;

    CallBridge::new(instance).context("Guest module does not expose the bridge exports")
}
