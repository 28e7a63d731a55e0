use anyhow::{Context, Result, anyhow, bail};
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_RSS_URL: &str = "https://www.bank.lv/vk/ecb_rss.xml";
pub const DEFAULT_LOG_FILE: &str = "./logs/log.txt";
pub const DEFAULT_SERVER_PORT: &str = ":8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDriver {
    MySql,
    Sqlite,
}

impl FromStr for DbDriver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" => Ok(DbDriver::MySql),
            "sqlite" => Ok(DbDriver::Sqlite),
            _ => Err(anyhow!("Unsupported database driver: {}", s)),
        }
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub driver: DbDriver,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("driver", &self.driver)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DatabaseConfig {
    /// Connection URL for the configured sqlx driver.
    pub fn url(&self) -> Result<String> {
        match self.driver {
            DbDriver::MySql => {
                let mut url = Url::parse(&format!(
                    "mysql://{}:{}/{}",
                    self.host, self.port, self.name
                ))
                .with_context(|| format!("Invalid database host: {}", self.host))?;
                url.set_username(&self.user)
                    .map_err(|_| anyhow!("Invalid database user: {}", self.user))?;
                if !self.password.is_empty() {
                    url.set_password(Some(&self.password))
                        .map_err(|_| anyhow!("Invalid database password"))?;
                }
                Ok(url.to_string())
            }
            DbDriver::Sqlite if self.name == ":memory:" => Ok("sqlite::memory:".to_string()),
            DbDriver::Sqlite => Ok(format!("sqlite://{}?mode=rwc", self.name)),
        }
    }
}

/// Application settings, read once at startup and handed to constructors.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub feed_url: String,
    pub fetch_timeout: Duration,
    pub log_file: PathBuf,
    pub server_addr: String,
}

impl AppConfig {
    /// Loads settings from the process environment, honouring a `.env` file.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let parsed = |key: &str, default: &str| -> Result<u64> {
            let raw = var(key, default);
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'"))
        };

        let name = match lookup("DB_NAME") {
            Some(name) if !name.trim().is_empty() => name,
            _ => bail!("DB_NAME is required"),
        };

        let database = DatabaseConfig {
            driver: var("DB_DRIVER", "mysql").parse()?,
            user: var("DB_USER", "root"),
            password: var("DB_PASSWORD", ""),
            host: var("DB_HOST", "localhost"),
            port: u16::try_from(parsed("DB_PORT", "3306")?).context("DB_PORT is out of range")?,
            name,
            max_connections: u32::try_from(parsed("DB_MAX_CONNECTIONS", "5")?)
                .context("DB_MAX_CONNECTIONS is out of range")?
                .max(1),
        };

        Ok(AppConfig {
            database,
            feed_url: var("RSS_URL", DEFAULT_RSS_URL),
            fetch_timeout: Duration::from_secs(parsed("FETCH_TIMEOUT_SECS", "30")?),
            log_file: PathBuf::from(var("LOG_FILE", DEFAULT_LOG_FILE)),
            server_addr: listen_addr(&var("SERVER_PORT", DEFAULT_SERVER_PORT)),
        })
    }
}

/// A bare `:port` listens on every interface.
fn listen_addr(raw: &str) -> String {
    match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => raw.to_string(),
    }
}
