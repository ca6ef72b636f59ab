// # JSON File Config Loader
//
// File-based implementation of ConfigLoader.
//
// ## Write Safety
//
// - Atomic writes: new content goes to a temporary file, then is renamed
// - Permissions: the file holds an API token, so it is created `0600` on Unix
//
// ## File Format
//
// ```json
// {
//   "api_token": "…",
//   "zone_id": "023e105f4ecef8ad9ca31a8372d0c353",
//   "record_name": "host.example.com",
//   "record_type": "A"
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::Configuration;
use crate::traits::ConfigLoader;
use crate::Error;

/// JSON file configuration loader
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::loader::JsonFileConfigLoader;
/// use ddns_core::traits::ConfigLoader;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let loader = JsonFileConfigLoader::new("/etc/ddns/config.json");
///     let config = loader.load().await?;
///     config.validate()?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonFileConfigLoader {
    path: PathBuf,
}

impl JsonFileConfigLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }

    async fn write_atomically(&self, json: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(0o600))
                    .await?;
            }

            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::config(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl ConfigLoader for JsonFileConfigLoader {
    async fn load(&self) -> Result<Configuration, Error> {
        if !self.path.exists() {
            tracing::debug!("Config file does not exist: {}", self.path.display());
            return Ok(Configuration::default());
        }

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let config: Configuration = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse config file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!("Loaded configuration from {}", self.path.display());
        Ok(config)
    }

    async fn save(&self, config: &Configuration) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(config)?;
        self.write_atomically(&json).await?;
        tracing::info!("Configuration saved to {}", self.path.display());
        Ok(())
    }
}
