use std::env::current_exe;
use std::path::{Path, PathBuf};
use std::str;
use directories_next::ProjectDirs;
use log::{debug, info};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::config::types::Config;
use crate::error::ConfigError;

// creates a path to glove-capture.json next to the executable, for portable installs
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            if !path.set_extension("json") {
                debug!("current exe has no filename: {}", path.to_string_lossy());
                return None;
            }

            Some(path)
        },
        Err(err) => {
            debug!("failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to glove-capture.json in an os dependent standard directory, such as
// ~/.config/glove-capture on linux
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "signal", "glove-capture").map(|dirs| {
        dirs.config_dir().join("glove-capture.json")
    })
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = get_portable_config_path() {
        if std::fs::metadata(&path).map(|attr| attr.is_file()).unwrap_or(false) {
            return Ok(path);
        }
    }

    get_local_config_path().ok_or(ConfigError::NoConfigPath)
}

pub async fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    info!("Reading config file {}", path.to_string_lossy());
    let mut file = File::open(path).await?;

    let mut content = vec![];
    file.read_to_end(&mut content).await?;

    if content.is_empty() {
        return Ok(Config::default());
    }

    let content = str::from_utf8(&content)?;
    Ok(serde_json::from_str(content)?)
}

/// Read the config from `explicit`, or from the default location if none was given.
/// A missing file at the default location means defaults; a missing explicit file is an error.
/// The result is not validated yet, command line overrides still have to be applied.
pub async fn read_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(path) => return read_config_file(path).await,
        None => get_config_path()?,
    };

    match read_config_file(&path).await {
        Err(err) if err.is_file_not_found_error() => {
            // this is probably the first start of the app
            info!("Config file not found, using defaults");
            Ok(Config::default())
        },
        result => result,
    }
}
