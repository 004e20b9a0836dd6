use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A `(regex, group)` pair mapping third-party sources onto a package group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThirdPartyMapping {
    pub pattern: String,
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LakosgraphConfig {
    pub database: Option<String>,
    pub source_dir: Option<String>,
    #[serde(default)]
    pub compile_commands: Vec<String>,
    #[serde(default)]
    pub non_lakosian_dirs: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
    pub threads: Option<usize>,
    #[serde(default)]
    pub third_party: Vec<ThirdPartyMapping>,
}

impl LakosgraphConfig {
    /// Worker count for the scanner, never zero.
    pub fn thread_count(&self) -> usize {
        self.threads
            .filter(|n| *n > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
    }

    /// Source directory resolved against `base`.
    pub fn source_dir_in(&self, base: &Path) -> PathBuf {
        match &self.source_dir {
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        }
    }

    pub fn database_path_in(&self, base: &Path) -> PathBuf {
        match &self.database {
            Some(db) => base.join(db),
            None => default_database_path_in(base),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("lakosgraph.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".lakosgraph").join("codebase.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<LakosgraphConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: LakosgraphConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &LakosgraphConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
