use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

const ENV_PREFIX: &str = "DOCJSON";

/// Runtime settings. Defaults below, overridden by `DOCJSON_*` environment
/// variables (e.g. `DOCJSON_OUTPUT_DIR=/tmp/out`), then by CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Where uploaded files are stored before conversion.
    pub uploads_dir: PathBuf,
    /// Where JSON artifacts are written.
    pub output_dir: PathBuf,
    pub db_path: PathBuf,
    pub addr: String,
    pub save_json: bool,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("uploads_dir", "uploads")?
            .set_default("output_dir", "temp")?
            .set_default("db_path", "data/docjson.sqlite")?
            .set_default("addr", "0.0.0.0:3000")?
            .set_default("save_json", true)?
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        Ok(settings)
    }

    /// Create the uploads, output and database directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.uploads_dir)
            .with_context(|| format!("Failed to create {}", self.uploads_dir.display()))?;
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create {}", self.output_dir.display()))?;
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Ok(())
    }
}
