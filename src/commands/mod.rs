//! Command handlers for the `gator` binary.
//!
//! Every handler receives the [`Session`] explicitly and writes its
//! human-readable output to `out`, so the same code serves the binary
//! (stdout) and the tests (a `Vec<u8>`).

mod agg;
mod feeds;
mod users;

pub use agg::{agg, resolve_interval};
pub use feeds::{addfeed, browse, feeds, follow, following, unfollow, DEFAULT_BROWSE_LIMIT};
pub use users::{login, register, reset, users};

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::storage::{Database, User};

/// Everything a command needs: the open database and the loaded config.
pub struct Session {
    pub db: Database,
    pub config: Config,
    config_path: PathBuf,
}

impl Session {
    pub fn new(db: Database, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config,
            config_path,
        }
    }

    /// Load the config at `config_path` and open the database it points to.
    pub async fn open(config_path: PathBuf) -> Result<Self> {
        let config = Config::load(&config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        let db_path = config.resolve_database_path(&config_path);
        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("Failed to create database directory {}", dir.display())
            })?;
        }
        let db_path_str = db_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
        let db = Database::open(db_path_str)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        Ok(Self::new(db, config, config_path))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Record `name` as the current user in the config file.
    pub fn set_current_user(&mut self, name: &str) -> Result<()> {
        self.config
            .set_user(name, &self.config_path)
            .with_context(|| format!("Failed to save config to {}", self.config_path.display()))
    }

    /// The user named in the config, which must exist in the database.
    pub async fn current_user(&self) -> Result<User> {
        let Some(name) = self.config.current_user_name.as_deref() else {
            bail!("No user is logged in. Run `gator register <name>` or `gator login <name>` first.");
        };
        match self.db.get_user_by_name(name).await? {
            Some(user) => Ok(user),
            None => bail!("Current user {name:?} does not exist. Run `gator login <name>`."),
        }
    }
}
