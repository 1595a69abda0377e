//! Settings file discovery and loading

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sampler_engine::SamplerConfig;

/// Environment variable naming a settings file
pub const CONFIG_ENV: &str = "SAMPLER_CONFIG";

/// Where the settings came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsSource {
    /// Explicit path from the command line or environment
    Explicit(PathBuf),
    /// The per-user settings file
    UserFile(PathBuf),
    /// Built-in defaults
    Defaults,
}

/// Per-user settings file, `<config_dir>/sampler/settings.json`
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sampler").join("settings.json"))
}

/// Read and validate a settings file
pub fn load_file(path: &Path) -> Result<SamplerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    let config: SamplerConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse settings {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid settings {}", path.display()))?;
    Ok(config)
}

/// Resolve settings in order: `arg`, `env`, then `user_file`, else defaults
///
/// An explicit path must load. The user file is optional; when it exists it
/// must load too.
pub fn resolve(
    arg: Option<PathBuf>,
    env: Option<PathBuf>,
    user_file: Option<PathBuf>,
) -> Result<(SamplerConfig, SettingsSource)> {
    if let Some(path) = arg.or(env) {
        let config = load_file(&path)?;
        return Ok((config, SettingsSource::Explicit(path)));
    }

    match user_file {
        Some(path) if path.is_file() => {
            let config = load_file(&path)?;
            Ok((config, SettingsSource::UserFile(path)))
        }
        _ => Ok((SamplerConfig::default(), SettingsSource::Defaults)),
    }
}

/// Load settings for this process
pub fn load() -> Result<(SamplerConfig, SettingsSource)> {
    resolve(
        std::env::args_os().nth(1).map(PathBuf::from),
        std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        default_settings_path(),
    )
}
