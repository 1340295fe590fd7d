use std::fs;
use std::path::Path;

use schemagraph_core::EngineSettings;
use tracing::debug;

use crate::CliError;

/// Load engine settings from a TOML file, falling back to defaults when no
/// file is given.
pub fn load_settings(path: Option<&Path>) -> Result<EngineSettings, CliError> {
    let Some(path) = path else {
        return Ok(EngineSettings::default());
    };
    let content = fs::read_to_string(path)?;
    let settings = parse_settings(&content)?;
    debug!(path = %path.display(), "engine settings loaded");
    Ok(settings)
}

pub fn parse_settings(content: &str) -> Result<EngineSettings, CliError> {
    Ok(toml::from_str(content)?)
}
