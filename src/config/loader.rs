// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a config file without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let text = fs::read_to_string(path.as_ref())?;
    Ok(toml::from_str(&text)?)
}

/// Read a config file and turn it into a validated [`ConfigFile`].
///
/// Every check that can fail at load time happens here (triggers, steps and
/// `while` loops, `depend_on` links, cycles, `[config]` limits), so a
/// scheduler built from the result never meets a configuration error.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

/// `Clockdag.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Clockdag.toml")
}
