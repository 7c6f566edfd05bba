use std::env;
use std::io;
use std::path::Path;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

macro_rules! from_environment {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            {
                if let Ok(value) = env::var($key) {
                    if let Ok(value) = value.parse() {
                        $config.$name = value;
                    }
                }
            }
        )*
    }};
}

macro_rules! from_environment_error {
    ($config:expr, $($key:expr, $name:tt),*$(,)?) => {{
        $(
            let value = env::var($key).map_err(|_| ConfigError::MissingField($key))?;
            $config.$name = value.parse().map_err(|_| ConfigError::MissingField($key))?;
        )*
    }};
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub database: Database,
    pub loglevel: LevelFilter,
    #[serde(default)]
    pub seeding: Seeding,
}

impl Config {
    pub async fn from_file<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let mut file = File::open(path).await?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        Ok(toml::from_slice(&buf)?)
    }

    /// Creates a complete [`Config`] instance from the environment.
    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut this = Self::default();

        from_environment_error!(this, "KO_LOGLEVEL", loglevel);

        this.database = Database::from_environment()?;
        this.seeding = Seeding::default().with_environment();

        Ok(this)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(self, "KO_LOGLEVEL", loglevel);
        self.database = self.database.with_environment();
        self.seeding = self.seeding.with_environment();

        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: Database::default(),
            loglevel: LevelFilter::Info,
            seeding: Seeding::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Database {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub prefix: String,
}

impl Database {
    pub fn connect_string(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}?ssl-mode=DISABLED",
            self.driver, self.user, self.password, self.host, self.port, self.database
        )
    }

    pub fn from_environment() -> Result<Self, ConfigError> {
        let mut this = Self::default();

        from_environment_error!(
            this,
            "KO_DB_DRIVER",
            driver,
            "KO_DB_HOST",
            host,
            "KO_DB_PORT",
            port,
            "KO_DB_USER",
            user,
            "KO_DB_PASSWORD",
            password,
            "KO_DB_DATABASE",
            database,
        );

        from_environment!(this, "KO_DB_PREFIX", prefix);

        Ok(this)
    }

    pub fn with_environment(mut self) -> Self {
        from_environment!(
            self,
            "KO_DB_DRIVER",
            driver,
            "KO_DB_HOST",
            host,
            "KO_DB_PORT",
            port,
            "KO_DB_USER",
            user,
            "KO_DB_PASSWORD",
            password,
            "KO_DB_DATABASE",
            database,
            "KO_DB_PREFIX",
            prefix,
        );

        self
    }
}

/// How the initial pairing is drawn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seeding {
    /// A fixed seed for the shuffle. A fresh random draw is made for every bracket if unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Seeding {
    pub fn with_environment(mut self) -> Self {
        if let Ok(value) = env::var("KO_SEED") {
            if let Ok(seed) = value.parse() {
                self.seed = Some(seed);
            }
        }

        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("missing config field: {0}")]
    MissingField(&'static str),
}
