//! Planner configuration.
//!
//! Loaded from `~/.epic-planner/config.toml` unless `--config` names another
//! file. Dates are written as quoted `YYYY-MM-DD` strings.

use std::fs;
use std::path::{Path, PathBuf};

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::engine::DependencyPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,

    #[error(
        "no config file found at {}\n\
         Create one with at minimum:\n\n\
         initial-sprint-start = \"2024-01-01\"",
        .0.display()
    )]
    Missing(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{key} must be greater than zero")]
    NotPositive { key: &'static str },
}

pub type Result<T> = core::result::Result<T, ConfigError>;

/// Planner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Start date of sprint 0.
    pub initial_sprint_start: Date,

    /// Added to sprint indexes wherever sprints are shown.
    #[serde(default)]
    pub initial_sprint_number: usize,

    #[serde(default = "default_sprint_days")]
    pub sprint_days: u32,

    /// Working days the base capacities in a snapshot are expressed for.
    #[serde(default = "default_sprint_capacity_days")]
    pub sprint_capacity_days: u32,

    #[serde(default = "default_max_sprint_count")]
    pub max_sprint_count: usize,

    #[serde(default)]
    pub holidays: Vec<Date>,

    #[serde(default)]
    pub only_development_epics: bool,

    /// Overrides the policy otherwise derived from `only-development-epics`.
    #[serde(default)]
    pub dependency_policy: Option<DependencyPolicy>,

    /// Where saved runs go. Defaults to `~/.epic-planner/runs`.
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
}

fn default_sprint_days() -> u32 {
    21
}

fn default_sprint_capacity_days() -> u32 {
    15
}

fn default_max_sprint_count() -> usize {
    20
}

impl Config {
    /// Load config from `path`, or from the default location.
    /// Returns an error if the file is missing or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path().ok_or(ConfigError::NoHome)?,
        };

        if !path.exists() {
            return Err(ConfigError::Missing(path));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parses and validates TOML contents.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sprint_days == 0 {
            return Err(ConfigError::NotPositive { key: "sprint-days" });
        }
        if self.sprint_capacity_days == 0 {
            return Err(ConfigError::NotPositive {
                key: "sprint-capacity-days",
            });
        }
        if self.max_sprint_count == 0 {
            return Err(ConfigError::NotPositive {
                key: "max-sprint-count",
            });
        }
        Ok(())
    }

    /// The config file path: `~/.epic-planner/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".epic-planner").join("config.toml"))
    }

    /// Dependency policy for a run.
    ///
    /// Without an explicit setting, scheduling only development epics
    /// assumes their non-development dependencies are done.
    pub fn dependency_policy(&self, only_development_epics: bool) -> DependencyPolicy {
        self.dependency_policy.unwrap_or(if only_development_epics {
            DependencyPolicy::AssumeNonDevelopmentDone
        } else {
            DependencyPolicy::Strict
        })
    }
}
