use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::VerifierError;
use crate::traceability::merkle::DigestAlgorithm;

pub const DEFAULT_CONFIG_FILE: &str = "traceability-verifier";
pub const DEFAULT_LOG_FILTER: &str = "traceability_verifier=info";
pub const ENV_PREFIX: &str = "TRACEABILITY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub workspace_root: PathBuf,
    pub digest_algorithm: DigestAlgorithm,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("./workspace"),
            digest_algorithm: DigestAlgorithm::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the configuration file, then `TRACEABILITY_*` variables.
    ///
    /// An explicit `path` must exist; otherwise `traceability-verifier.{toml,yaml,json}`
    /// in the working directory is read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, VerifierError> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default(
                "workspace_root",
                defaults.workspace_root.to_string_lossy().to_string(),
            )?
            .set_default("digest_algorithm", defaults.digest_algorithm.to_string())?
            .set_default("log_filter", defaults.log_filter)?;

        builder = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(VerifierError::ConfigError(format!(
                        "Configuration file not found: {:?}",
                        path
                    )));
                }
                builder.add_source(File::from(path).required(true))
            }
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
