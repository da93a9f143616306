use log::info;
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` opens a temporary database that is removed on shutdown.
    pub database_path: Option<PathBuf>,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let bcrypt_cost: u32 = try_load(&lookup, "BCRYPT_COST", "10")?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                message: format!("{} is outside 4..=31", bcrypt_cost),
            });
        }
        Ok(Config {
            host: try_load(&lookup, "HOST", "127.0.0.1")?,
            port: try_load(&lookup, "PORT", "3000")?,
            database_path: lookup("DATABASE_PATH").map(PathBuf::from),
            bcrypt_cost,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn open_database(&self) -> sled::Result<sled::Db> {
        match &self.database_path {
            Some(path) => sled::open(path),
            None => {
                info!("DATABASE_PATH not set, using a temporary database");
                sled::Config::new().temporary(true).open()
            }
        }
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{} not set, using default: {}", key, default);
            default.to_owned()
        })
        .parse()
        .map_err(|err: T::Err| ConfigError::Invalid {
            key,
            message: err.to_string(),
        })
}
