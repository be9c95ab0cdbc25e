use std::path::{Path, PathBuf};
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::logs;
use crate::store::config::DbConfig;

/// Locations the configuration is read from and relative data is written to.
pub struct PathSet {
    pub config_path: PathBuf,
    pub data_path: PathBuf,
}

impl PathSet {
    /// Resolves paths from explicit arguments, then `WARDEN_CONFIG` /
    /// `WARDEN_DATA`, then the user's home directory.
    pub fn new(config_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => match env::var("WARDEN_CONFIG") {
                Ok(path) => PathBuf::from(path),
                Err(_) => Self::home_dir()?
                    .join(".config")
                    .join("warden")
                    .join("warden.toml"),
            },
        };

        let data_path = match data_path {
            Some(path) => path,
            None => match env::var("WARDEN_DATA") {
                Ok(path) => PathBuf::from(path),
                Err(_) => Self::home_dir()?.join(".local").join("share").join("warden"),
            },
        };

        Ok(Self {
            config_path,
            data_path,
        })
    }

    /// Reads and completes the config file. A missing file yields the
    /// defaults.
    pub fn load_config<T, F>(&self, default_func: F) -> Result<T>
    where
        T: CommonConfig + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let path = &self.config_path;
        let mut cfg: T = match fs::read_to_string(path) {
            Ok(s) => toml::from_str(&s).context("parse config toml")?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                default_func()
            }
            Err(err) => {
                return Err(err).context(format!("read config file: {}", path.display()));
            }
        };

        cfg.complete(self).context("validate config")?;
        Ok(cfg)
    }

    /// Creates the data directory if needed and returns `name` inside it.
    pub fn data_file(&self, name: &str) -> Result<PathBuf> {
        ensure_dir_exists(&self.data_path)
            .with_context(|| format!("ensure data directory: {}", self.data_path.display()))?;
        Ok(self.data_path.join(name))
    }

    fn home_dir() -> Result<PathBuf> {
        let dir = env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from);
        match dir {
            Some(dir) => Ok(dir),
            None => bail!("could not determine home directory, please specify config path manually"),
        }
    }
}

pub trait CommonConfig {
    fn default() -> Self;
    fn complete(&mut self, ps: &PathSet) -> Result<()>;
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "LogsConfig::default")]
    pub logs: LogsConfig,

    #[serde(default = "DbConfig::default")]
    pub db: DbConfig,
}

impl CommonConfig for Config {
    fn default() -> Self {
        Self {
            logs: LogsConfig::default(),
            db: DbConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.logs.complete(ps).context("logs")?;
        self.db.complete(ps).context("db")?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogsConfig {
    #[serde(default = "LogsConfig::default_level")]
    pub level: String,
}

impl CommonConfig for LogsConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.level = expandenv("level", &self.level)?;
        logs::parse_level(&self.level)?;
        Ok(())
    }
}

impl LogsConfig {
    fn default_level() -> String {
        String::from("info")
    }
}

/// See: [`shellexpand::full`].
pub fn expandenv(name: &str, s: impl AsRef<str>) -> Result<String> {
    let s =
        shellexpand::full(s.as_ref()).with_context(|| format!("expand env value for '{name}'"))?;
    Ok(s.to_string())
}

fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        return Ok(());
    }
    if !path.is_dir() {
        bail!("'{}' is not a directory", path.display());
    }
    Ok(())
}
