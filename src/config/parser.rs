use super::Config;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const CONFIG_DIR_ENV: &str = "PORT_SELECTOR_CONFIG_DIR";

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Default config directory: `$PORT_SELECTOR_CONFIG_DIR`, else
    /// `<platform config dir>/port-selector`.
    pub fn default_config_dir(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        Ok(base.join("port-selector"))
    }

    /// Load `config.yaml` from `config_dir`, writing the defaults when the file
    /// does not exist yet.
    pub fn load_or_init(&self, config_dir: &Path) -> Result<Config> {
        let path = config_dir.join(CONFIG_FILE_NAME);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Config::default();
                if let Err(e) = self.write_default(config_dir, &config) {
                    // Read-only config dirs still work with in-memory defaults
                    warn!("Could not write default config to {:?}: {}", path, e);
                }
                return Ok(config);
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                )))
            }
        };

        let config = self.parse_config(&content)?;
        config.validate()?;
        debug!(
            "Loaded config from {:?}: range {}-{}",
            path, config.port_start, config.port_end
        );
        Ok(config)
    }

    /// Parse config from YAML string
    pub fn parse_config(&self, content: &str) -> Result<Config> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| Error::Parse(format!("Failed to parse YAML config: {}", e)))?;

        Ok(config)
    }

    fn write_default(&self, config_dir: &Path, config: &Config) -> Result<()> {
        fs::create_dir_all(config_dir).map_err(|e| {
            Error::Filesystem(format!(
                "Failed to create config directory '{}': {}",
                config_dir.display(),
                e
            ))
        })?;
        let content = serde_yaml::to_string(config)?;
        fs::write(config_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
