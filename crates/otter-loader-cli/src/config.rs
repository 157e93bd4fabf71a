//! Configuration file parsing for otter-loader.toml.

use std::path::{Path, PathBuf};

use otter_loader::LoaderConfig;
use serde::Deserialize;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Loader settings
    #[serde(default)]
    pub loader: LoaderConfig,
}

const CONFIG_NAMES: &[&str] = &["otter-loader.toml", ".otter-loader.toml"];

/// Load configuration from a file or search for a default config file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = path.map(PathBuf::from).or_else(find_config_file);

    match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        Some(path) => anyhow::bail!("Config file not found: {}", path.display()),
        None => Ok(Config::default()),
    }
}

/// Search the current directory and its parents.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}
