// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks run identifiers, the build command and exclusions.
/// - Resolves relative `[index].path`, `[run].runs_root` and
///   `[build].workdir` against the config file's directory.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let mut config = ConfigFile::try_from(raw_config)?;

    let base = config_root_dir(path.as_ref());
    config.index.path = resolve(&base, &config.index.path);
    config.run.runs_root = resolve(&base, &config.run.runs_root);
    config.build.workdir = config.build.workdir.as_ref().map(|w| resolve(&base, w));

    Ok(config)
}

/// Helper to resolve a default config path: `stackbuild.toml` in the
/// current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("stackbuild.toml")
}

/// Directory relative paths in a config file are resolved against.
///
/// A bare filename like "stackbuild.toml" (parent = "") resolves against
/// the current directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
