//! Environment matrix: the built-in defaults and the YAML file format.
//!
//! # File Format
//!
//! ```yaml
//! - name: local-chrome
//!   target: local
//!   capabilities:
//!     browserName: chrome
//! - name: firefox-windows-10
//!   capabilities:          # target defaults to remote
//!     browserName: firefox
//!     browserVersion: latest
//!     os: Windows
//!     os_version: "10"
//! ```
//!
//! The first `local` entry, if any, is the local run; every `remote` entry runs
//! in parallel. Names must be unique since they namespace output paths.

use crate::error::{Error, Result};
use crate::models::{EnvironmentConfig, Target};
use crate::utils::slugify;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, instrument, warn};

/// The environments of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    pub local: Option<EnvironmentConfig>,
    pub remote: Vec<EnvironmentConfig>,
}

fn config(name: &str, target: Target, caps: &[(&str, &str)]) -> EnvironmentConfig {
    EnvironmentConfig {
        name: name.to_string(),
        target,
        capabilities: caps
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn default_local() -> EnvironmentConfig {
    config("local-chrome", Target::Local, &[("browserName", "chrome")])
}

/// Desktop browsers on Windows plus two real mobile devices.
pub fn default_remote() -> Vec<EnvironmentConfig> {
    vec![
        config(
            "chrome-windows-10",
            Target::Remote,
            &[("browserName", "chrome"), ("browserVersion", "latest"), ("os", "Windows"), ("os_version", "10")],
        ),
        config(
            "firefox-windows-10",
            Target::Remote,
            &[("browserName", "firefox"), ("browserVersion", "latest"), ("os", "Windows"), ("os_version", "10")],
        ),
        config(
            "edge-windows-10",
            Target::Remote,
            &[("browserName", "edge"), ("browserVersion", "latest"), ("os", "Windows"), ("os_version", "10")],
        ),
        config(
            "chrome-samsung-galaxy-s22",
            Target::Remote,
            &[("browserName", "chrome"), ("device", "Samsung Galaxy S22"), ("os", "android"), ("realMobile", "true")],
        ),
        config(
            "safari-iphone-14-pro",
            Target::Remote,
            &[("browserName", "safari"), ("device", "iPhone 14 Pro"), ("os", "ios"), ("realMobile", "true")],
        ),
        config(
            "ie-windows-7",
            Target::Remote,
            &[("browserName", "ie"), ("browserVersion", "11.0"), ("os", "Windows"), ("os_version", "7")],
        ),
    ]
}

impl Matrix {
    pub fn builtin() -> Self {
        Self {
            local: Some(default_local()),
            remote: default_remote(),
        }
    }

    /// Split a flat list into the local run and the remote runs.
    pub fn from_configs(configs: Vec<EnvironmentConfig>) -> Result<Self> {
        let duplicates = configs
            .iter()
            .map(|c| slugify(&c.name))
            .duplicates()
            .collect::<Vec<_>>();
        if !duplicates.is_empty() {
            return Err(Error::InvalidEnvironments(format!(
                "duplicate environment names: {}",
                duplicates.iter().join(", ")
            )));
        }

        let (locals, remote): (Vec<_>, Vec<_>) =
            configs.into_iter().partition(|c| c.target == Target::Local);
        let mut locals = locals.into_iter();
        let local = locals.next();
        for extra in locals {
            warn!(environment = %extra.name, "Only one local environment runs; ignoring");
        }
        Ok(Self { local, remote })
    }

    pub fn parse_yaml(yaml: &str) -> Result<Self> {
        let configs: Vec<EnvironmentConfig> = serde_yaml::from_str(yaml)?;
        Self::from_configs(configs)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        let matrix = Self::parse_yaml(&yaml)?;
        info!(
            local = matrix.local.is_some(),
            remote = matrix.remote.len(),
            "Loaded environment matrix"
        );
        Ok(matrix)
    }
}
