//! Path configuration.
//!
//! Paths come from command-line flags first, then from the optional
//! `.automigrate.toml` project file, then from the defaults:
//!
//! ```toml
//! migrations_path = "db/migrations"
//! models_path = "db/models"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Default project configuration file.
pub const DEFAULT_CONFIG_FILE: &str = ".automigrate.toml";

/// Default migrations directory.
pub const DEFAULT_MIGRATIONS_PATH: &str = "migrations";

/// Default models location.
pub const DEFAULT_MODELS_PATH: &str = "models";

/// Contents of the project configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Directory holding snapshots and migration artifacts.
    #[serde(default)]
    pub migrations_path: Option<PathBuf>,
    /// Model file or directory read by the reflector.
    #[serde(default)]
    pub models_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Parses configuration text; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| MigrateError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Loads the file at `path`, or returns `None` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path).map(Some)
    }
}

/// Paths given on the command line.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    /// `--migrations-path`.
    pub migrations_path: Option<PathBuf>,
    /// `--models-path`.
    pub models_path: Option<PathBuf>,
}

/// Final, absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Directory holding snapshots and migration artifacts.
    pub migrations_path: PathBuf,
    /// Model file or directory.
    pub models_path: PathBuf,
}

/// Resolves paths against `cwd` with precedence flags, file, defaults.
#[must_use]
pub fn resolve(overrides: &PathOverrides, file: Option<&ConfigFile>, cwd: &Path) -> ResolvedPaths {
    let pick = |flag: &Option<PathBuf>, from_file: Option<&PathBuf>, default: &str| {
        let path = flag
            .clone()
            .or_else(|| from_file.cloned())
            .unwrap_or_else(|| PathBuf::from(default));
        if path.is_absolute() {
            path
        } else {
            cwd.join(path)
        }
    };

    ResolvedPaths {
        migrations_path: pick(
            &overrides.migrations_path,
            file.and_then(|f| f.migrations_path.as_ref()),
            DEFAULT_MIGRATIONS_PATH,
        ),
        models_path: pick(
            &overrides.models_path,
            file.and_then(|f| f.models_path.as_ref()),
            DEFAULT_MODELS_PATH,
        ),
    }
}
