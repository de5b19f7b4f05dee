//! Connection and environment configuration.

use crate::error::{DbError, DbResult};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::config::Host;

const DEFAULT_PORT: u16 = 5432;

/// Application environment. Governs how statement failures are surfaced.
///
/// - `Development`: failures are returned as [`DbError::Query`] with the rendered SQL.
/// - `Production`: failures are logged and returned as [`DbError::QueryFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Development,
    Production,
}

impl AppEnv {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl FromStr for AppEnv {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(DbError::Config(format!("unknown APP_ENV '{other}'"))),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database connection settings.
///
/// Built from defaults, environment variables ([`DatabaseConfig::from_env`]),
/// a `postgres://` URL ([`DatabaseConfig::from_url`]) or a TOML document
/// ([`DatabaseConfig::from_toml_str`]).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Client character set. MySQL-style names (`utf8mb4`) are accepted.
    pub charset: String,
    pub app_env: AppEnv,
    /// Parsed connection string from [`DatabaseConfig::from_url`].
    #[serde(skip)]
    url: Option<tokio_postgres::Config>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            dbname: "school_management".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            charset: "UTF8".to_string(),
            app_env: AppEnv::Development,
            url: None,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("charset", &self.charset)
            .field("app_env", &self.app_env)
            .finish()
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database: DatabaseConfig,
}

impl DatabaseConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = dbname.into();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn app_env(mut self, app_env: AppEnv) -> Self {
        self.app_env = app_env;
        self
    }

    /// Parse a libpq connection string, either a `postgres://` URL or
    /// `key=value` pairs.
    ///
    /// Host, port, user, password and dbname are copied into the plain fields so
    /// `DB_*` variables can override them. Everything else the string carries
    /// (`sslmode`, `connect_timeout`, `options`, extra hosts) is kept and applied by
    /// [`DatabaseConfig::to_pg_config`].
    pub fn from_url(database_url: &str) -> DbResult<Self> {
        let pg: tokio_postgres::Config = database_url
            .parse()
            .map_err(|e: tokio_postgres::Error| DbError::Config(format!("invalid database url: {e}")))?;

        let mut config = Self::default();
        if let Some(host) = pg.get_hosts().first() {
            config.host = host_name(host);
        }
        if let Some(port) = pg.get_ports().first() {
            config.port = *port;
        }
        if let Some(user) = pg.get_user() {
            config.user = user.to_string();
        }
        if let Some(password) = pg.get_password() {
            config.password = String::from_utf8(password.to_vec())
                .map_err(|_| DbError::Config("database password is not valid UTF-8".into()))?;
        }
        if let Some(dbname) = pg.get_dbname() {
            config.dbname = dbname.to_string();
        }
        config.url = Some(pg);
        Ok(config)
    }

    /// Load configuration from the process environment (and a `.env` file, if present).
    ///
    /// `DATABASE_URL` is used as the base when set; `DB_HOST`, `DB_PORT`, `DB_NAME`,
    /// `DB_USER`, `DB_PASS`, `DB_CHARSET` and `APP_ENV` override individual fields.
    pub fn from_env() -> DbResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DatabaseConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let mut config = match lookup("DATABASE_URL") {
            Some(url) if !url.trim().is_empty() => Self::from_url(url.trim())?,
            _ => Self::default(),
        };

        if let Some(host) = lookup("DB_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| DbError::Config(format!("DB_PORT is not a port number: '{port}'")))?;
        }
        if let Some(dbname) = lookup("DB_NAME") {
            config.dbname = dbname;
        }
        if let Some(user) = lookup("DB_USER") {
            config.user = user;
        }
        if let Some(password) = lookup("DB_PASS") {
            config.password = password;
        }
        if let Some(charset) = lookup("DB_CHARSET") {
            config.charset = charset;
        }
        if let Some(app_env) = lookup("APP_ENV") {
            config.app_env = app_env.parse()?;
        }
        Ok(config)
    }

    /// Parse the `[database]` table of a TOML document.
    ///
    /// ```toml
    /// [database]
    /// host = "db.internal"
    /// dbname = "school_management"
    /// app_env = "production"
    /// ```
    pub fn from_toml_str(source: &str) -> DbResult<Self> {
        let file: ConfigFile =
            toml::from_str(source).map_err(|e| DbError::Config(e.to_string()))?;
        Ok(file.database)
    }

    /// PostgreSQL `client_encoding` for the configured charset.
    pub fn client_encoding(&self) -> String {
        match self.charset.to_ascii_lowercase().as_str() {
            "utf8" | "utf8mb4" | "utf-8" => "UTF8".to_string(),
            "latin1" => "LATIN1".to_string(),
            _ => self.charset.to_ascii_uppercase(),
        }
    }

    /// Build the driver configuration.
    ///
    /// Starts from the parsed connection string when there is one. If `host` or
    /// `port` were changed afterwards, its host list is replaced by the single
    /// configured endpoint and its other settings are carried over.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut pg = match &self.url {
            Some(url) if self.same_endpoint(url) => url.clone(),
            Some(url) => {
                let mut pg = tokio_postgres::Config::new();
                pg.host(&self.host).port(self.port).ssl_mode(url.get_ssl_mode());
                if let Some(timeout) = url.get_connect_timeout() {
                    pg.connect_timeout(*timeout);
                }
                if let Some(options) = url.get_options() {
                    pg.options(options);
                }
                if let Some(name) = url.get_application_name() {
                    pg.application_name(name);
                }
                pg
            }
            None => {
                let mut pg = tokio_postgres::Config::new();
                pg.host(&self.host).port(self.port);
                pg
            }
        };

        pg.dbname(&self.dbname).user(&self.user);
        if !self.password.is_empty() {
            pg.password(&self.password);
        }
        if pg.get_application_name().is_none() {
            pg.application_name("rollcall");
        }
        let encoding = format!("-c client_encoding={}", self.client_encoding());
        let options = match pg.get_options() {
            Some(existing) => format!("{existing} {encoding}"),
            None => encoding,
        };
        pg.options(&options);
        pg
    }

    fn same_endpoint(&self, url: &tokio_postgres::Config) -> bool {
        let host = url.get_hosts().first().map(host_name);
        let port = url.get_ports().first().copied().unwrap_or(DEFAULT_PORT);
        host.is_some_and(|h| h == self.host) && port == self.port
    }
}

fn host_name(host: &Host) -> String {
    match host {
        Host::Tcp(name) => name.clone(),
        #[cfg(unix)]
        Host::Unix(path) => path.to_string_lossy().into_owned(),
    }
}
