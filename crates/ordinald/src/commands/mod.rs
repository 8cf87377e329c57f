pub mod init;
pub mod rollout;
pub mod workload;

use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

use ordinal_core::OrdinalConfig;
use ordinal_state::StateStore;

/// Load `path`, or fall back to defaults when no config was given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<OrdinalConfig> {
    match path {
        Some(path) => {
            let config = OrdinalConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            debug!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => Ok(OrdinalConfig::default()),
    }
}

/// Open the configured store, creating its directory if needed.
pub fn open_store(config: &OrdinalConfig) -> anyhow::Result<StateStore> {
    let path = config.store_path();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
    }
    let store = StateStore::open(&path)
        .with_context(|| format!("opening store at {}", path.display()))?;
    info!(path = %path.display(), "state store opened");
    Ok(store)
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::Path;

    use ordinal_core::OrdinalConfig;

    /// A config whose store lives under `dir`.
    pub fn config_in(dir: &Path) -> OrdinalConfig {
        OrdinalConfig::scaffold(&dir.join("state").join("ordinal.redb"))
    }
}
