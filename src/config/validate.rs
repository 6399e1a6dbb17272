// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{BuildSection, ConfigFile, RawBuildSection, RawConfigFile};
use crate::errors::{Result, StackbuildError};
use crate::types::FailureType;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StackbuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let build = validate_build(&raw.build)?;
        Ok(ConfigFile::new_unchecked(raw.run, raw.index, build, raw.exclusions))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_run(cfg)?;
    validate_exclusions(cfg)?;
    Ok(())
}

fn validate_run(cfg: &RawConfigFile) -> Result<()> {
    if cfg.run.target.trim().is_empty() {
        return Err(StackbuildError::ConfigError(
            "[run].target must not be empty".to_string(),
        ));
    }
    if cfg.run.series.trim().is_empty() {
        return Err(StackbuildError::ConfigError(
            "[run].series must not be empty".to_string(),
        ));
    }
    if let Some(bad) = cfg.run.packages.iter().find(|p| p.trim().is_empty()) {
        return Err(StackbuildError::ConfigError(format!(
            "[run].packages contains an empty name ({bad:?})"
        )));
    }
    Ok(())
}

fn validate_build(build: &RawBuildSection) -> Result<BuildSection> {
    if build.command.trim().is_empty() {
        return Err(StackbuildError::ConfigError(
            "[build].command must not be empty".to_string(),
        ));
    }
    if !build.command.contains("{package}") {
        return Err(StackbuildError::ConfigError(format!(
            "[build].command must contain the {{package}} placeholder (got {:?})",
            build.command
        )));
    }

    let mut exit_codes: BTreeMap<i32, FailureType> = BTreeMap::new();
    for (key, failure_type) in &build.exit_codes {
        let code: i32 = key.trim().parse().map_err(|_| {
            StackbuildError::ConfigError(format!(
                "[build.exit_codes] key {key:?} is not an integer"
            ))
        })?;
        if code == 0 {
            return Err(StackbuildError::ConfigError(
                "[build.exit_codes] cannot classify exit code 0 as a failure".to_string(),
            ));
        }
        exit_codes.insert(code, *failure_type);
    }

    Ok(BuildSection {
        command: build.command.clone(),
        workdir: build.workdir.clone(),
        exit_codes,
    })
}

fn validate_exclusions(cfg: &RawConfigFile) -> Result<()> {
    for (dependent, deps) in &cfg.exclusions.soft {
        if deps.iter().any(|d| d == dependent) {
            return Err(StackbuildError::ConfigError(format!(
                "[exclusions.soft] '{dependent}' cannot exclude itself"
            )));
        }
    }
    Ok(())
}
