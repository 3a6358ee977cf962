// src/config.rs
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Solver toggles, fixed when a constraint system is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SolverConfig {
    /// Let a lambda without a declared shape pick up an extension receiver from
    /// the function-type bound of its expected variable.
    pub forced_extension_receiver_in_lambdas: bool,
    /// Try both the upper-bound and lower-bound choice when a variable has to be
    /// fixed without a tight bound.
    pub allow_forking: bool,
    /// How many forks may nest before the upper choice is taken without a fork.
    pub max_fork_depth: usize,
    /// How many derivation steps incorporation may chain from an original constraint.
    pub max_incorporation_depth: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            forced_extension_receiver_in_lambdas: true,
            allow_forking: true,
            max_fork_depth: 4,
            max_incorporation_depth: 16,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to read solver configuration `{path}`")]
    #[diagnostic(code(kestrel_infer::config_io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid solver configuration: {0}")]
    #[diagnostic(code(kestrel_infer::config_parse))]
    Parse(#[from] toml::de::Error),
}

impl SolverConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        log::debug!("loaded solver configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
