use super::HarnessConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl HarnessConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: HarnessConfig =
            toml::from_str(content).context("Failed to parse harness configuration")?;
        Ok(config)
    }

    /// Load a config file, apply environment overrides, then validate.
    ///
    /// A missing file is not an error: defaults and the environment still apply.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Invalid config file '{}'", path.display()))?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.merge_env_vars();
        config.validate()?;
        Ok(config)
    }
}
