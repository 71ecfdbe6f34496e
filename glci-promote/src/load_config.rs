//! Loads the CI/CD configuration and flavour set files.
//!
//! This module is the only place where the YAML configuration files are read and
//! mapped to the typed structs of [`glci_promote_core::config`].
//!
//! # Errors
//! All errors use `anyhow::Error` with the offending path attached, and are
//! surfaced at the CLI boundary.

use anyhow::{Context, Result};
use glci_promote_core::config::{CicdCfg, CicdCfgFile, FlavoursFile};
use glci_promote_core::model::FlavourSet;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::{error, info};

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(e).with_context(|| format!("Failed to read config file {}", path.display()));
        }
    };

    match serde_yaml::from_str(&content) {
        Ok(parsed) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(parsed)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(e).with_context(|| format!("Failed to parse config YAML {}", path.display()))
        }
    }
}

/// Loads the CI/CD configuration named `name` from `path`.
pub fn load_cicd_cfg<P: AsRef<Path>>(path: P, name: &str) -> Result<CicdCfg> {
    let file: CicdCfgFile = read_yaml(path.as_ref())?;
    let cfg = file.find(name)?.clone();
    cfg.trace_loaded();
    Ok(cfg)
}

/// Loads the flavour set named `name` from `path`.
pub fn load_flavour_set<P: AsRef<Path>>(path: P, name: &str) -> Result<FlavourSet> {
    let file: FlavoursFile = read_yaml(path.as_ref())?;
    let flavour_set = file.find(name)?.clone();
    info!(
        flavour_set = %flavour_set.name,
        flavours = flavour_set.flavours().len(),
        "Loaded flavour set"
    );
    Ok(flavour_set)
}
