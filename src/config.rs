use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::{ConnectOptions, Pool, Target};

pub const DEFAULT_POOL_SIZE: usize = 5;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_IDLE_SECS: u64 = 7 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BlogstoreConfig {
    pub database: Option<String>,
    pub pool_size: Option<usize>,
    pub busy_timeout_ms: Option<u64>,
    pub max_idle_secs: Option<u64>,
}

impl BlogstoreConfig {
    /// Database path, relative paths resolved against `base`
    pub fn database_path(&self, base: &Path) -> PathBuf {
        match &self.database {
            Some(db) => base.join(db),
            None => default_database_path_in(base),
        }
    }

    /// Configured pool size; [`Pool::new`] rejects values outside 1..=32
    pub fn pool_size(&self) -> usize {
        self.pool_size.unwrap_or(DEFAULT_POOL_SIZE)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)),
            max_idle_time: Duration::from_secs(self.max_idle_secs.unwrap_or(DEFAULT_MAX_IDLE_SECS)),
        }
    }

    /// Open a pool of `pool_size` connections to the database file
    pub fn open_pool(&self, db_path: &Path) -> crate::Result<Pool> {
        Pool::new(
            self.pool_size(),
            Target::File(db_path.to_path_buf()),
            self.connect_options(),
        )
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("blogstore.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".blogstore").join("blog.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<BlogstoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: BlogstoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &BlogstoreConfig, force: bool) -> anyhow::Result<()> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blogstore.toml");
        let config = BlogstoreConfig {
            database: Some("data/blog.db".into()),
            pool_size: Some(8),
            ..Default::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.database_path(dir.path()), dir.path().join("data/blog.db"));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(BlogstoreConfig::default().pool_size(), DEFAULT_POOL_SIZE);
        assert_eq!(
            BlogstoreConfig::default().connect_options(),
            ConnectOptions::default()
        );
        assert_eq!(
            BlogstoreConfig::default().database_path(Path::new("/srv")),
            PathBuf::from("/srv/.blogstore/blog.db")
        );
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("a").join("b").join("blog.db");
        ensure_db_dir(&db_path).unwrap();
        assert!(db_path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_open_pool_uses_configured_size() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("blog.db");
        let config: BlogstoreConfig = toml::from_str("pool_size = 3").unwrap();

        let pool = config.open_pool(&db_path).unwrap();
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.idle_count(), 3);
    }

    #[test]
    fn test_out_of_range_pool_size_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("blog.db");
        for size in [0, 33, 500] {
            let config = BlogstoreConfig {
                pool_size: Some(size),
                ..Default::default()
            };
            assert_eq!(config.pool_size(), size);
            assert!(matches!(config.open_pool(&db_path), Err(crate::Error::Pool(_))));
        }
    }
}
