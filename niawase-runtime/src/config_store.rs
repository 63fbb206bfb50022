use crate::files::write_json_atomically;
use anyhow::Context;
use niawase_core::config::AppConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> anyhow::Result<AppConfig> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read config: {}", self.path.display()))?;
        let cfg: AppConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;
        Ok(cfg)
    }

    /// Loads the config file, or the built-in defaults when there is none yet.
    pub fn load_or_default(&self) -> anyhow::Result<AppConfig> {
        if self.exists() {
            self.load()
        } else {
            log::info!(
                "no config at {}; using defaults",
                self.path.display()
            );
            Ok(crate::defaults::default_app_config())
        }
    }

    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        write_json_atomically(&self.path, cfg)
            .with_context(|| format!("save config: {}", self.path.display()))
    }
}
