use crate::models::UserConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Name of the settings file inside the config directory.
pub const USER_CONFIG_FILE: &str = "image_clicker.yaml";

/// Prefix for environment overrides, e.g. `IMAGE_CLICKER_SETTINGS__THRESHOLD=0.9`.
pub const ENV_PREFIX: &str = "IMAGE_CLICKER";

/// Configuration manager for loading and saving the YAML settings file.
///
/// Loading layers the file (optional) under environment variables, then
/// resets any out-of-range value to its default with a warning.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at `config_dir`, creating it if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join(USER_CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the user configuration.
    ///
    /// # Returns
    /// The merged UserConfig; defaults fill anything the file and the
    /// environment leave out
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
        }

        let merged = Config::builder()
            .add_source(File::new(self.user_config_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let mut config: UserConfig = merged
            .try_deserialize()
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        for field in config.settings.sanitize() {
            tracing::warn!(
                "Invalid value for '{}' in {}, using default",
                field,
                self.user_config_path
            );
        }
        if config.paths.image_folder.trim().is_empty() {
            tracing::warn!("Empty image_folder in {}, using default", self.user_config_path);
            config.paths = Default::default();
        }

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Resolve the template folder. Relative paths are taken from the config directory.
    pub fn image_folder_path(&self, config: &UserConfig) -> Utf8PathBuf {
        let folder = Utf8Path::new(&config.paths.image_folder);
        if folder.is_absolute() {
            folder.to_path_buf()
        } else {
            self.config_dir.join(folder)
        }
    }

    /// Create the template folder if it does not exist yet.
    pub fn ensure_image_folder(&self, config: &UserConfig) -> Result<Utf8PathBuf> {
        let folder = self.image_folder_path(config);
        if !folder.exists() {
            fs::create_dir_all(&folder)
                .with_context(|| format!("Failed to create image folder: {}", folder))?;
            tracing::info!("Created image folder {}", folder);
        }
        Ok(folder)
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn user_config_path(&self) -> &Utf8Path {
        &self.user_config_path
    }
}
