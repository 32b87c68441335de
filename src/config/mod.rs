use crate::models::UnloaderConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the configuration inside the config directory
pub const CONFIG_FILE_NAME: &str = "Unloader.yaml";

/// Prefix of environment variables overriding configuration values
///
/// Nested keys are separated by a double underscore, e.g.
/// `UNLOADER_LOADING_MANAGER__AUTO_HIDE_DELAY_MS=750`.
pub const ENV_PREFIX: &str = "UNLOADER";

/// Configuration manager for loading and saving the YAML configuration file.
///
/// Manages `Unloader.yaml` in a configuration directory; a missing file means defaults.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the configuration file.
    ///
    /// # Returns
    /// The loaded config, or defaults if the file doesn't exist
    pub fn load_config(&self) -> Result<UnloaderConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
            return Ok(UnloaderConfig::default());
        }

        let file_contents = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: UnloaderConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!("Loaded config from {}", self.config_path);
        Ok(config)
    }

    /// Save the configuration file.
    pub fn save_config(&self, config: &UnloaderConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Load the configuration file with `UNLOADER_*` environment variables layered on top.
    pub fn load_layered(&self) -> Result<UnloaderConfig> {
        self.layered(None)
    }

    /// Same as [`load_layered`](Self::load_layered), reading overrides from `env` instead of
    /// the process environment.
    pub fn load_layered_from(
        &self,
        env: config::Map<String, String>,
    ) -> Result<UnloaderConfig> {
        self.layered(Some(env))
    }

    fn layered(&self, env: Option<config::Map<String, String>>) -> Result<UnloaderConfig> {
        let config = config::Config::builder()
            .add_source(
                config::File::from(self.config_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to layer config: {}", self.config_path))?;

        let config: UnloaderConfig = config
            .try_deserialize()
            .context("Failed to deserialize layered config")?;

        tracing::debug!("Layered config: {:?}", config);
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
