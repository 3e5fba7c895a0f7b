use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use uac_auth::config::AuthConfig;
use uac_auth::oauth::OAuthProfile;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Token, OAuth, CAS and lockout settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Shared store backend
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Initial admin account and registered applications
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Auth(#[from] uac_auth::ConfigError),
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.server.port == 0 {
            return Err(ConfigLoadError::Invalid("server.port must be > 0".into()));
        }
        if self.server.host.trim().is_empty() {
            return Err(ConfigLoadError::Invalid("server.host must not be empty".into()));
        }
        if self.redis.enabled && self.redis.url.trim().is_empty() {
            return Err(ConfigLoadError::Invalid(
                "redis.url must be set when redis is enabled".into(),
            ));
        }
        if self.store.purge_interval.is_zero() {
            return Err(ConfigLoadError::Invalid("store.purge_interval must be > 0".into()));
        }
        if let Some(admin) = &self.bootstrap.admin_user {
            if admin.username.trim().is_empty() || admin.password.is_empty() {
                return Err(ConfigLoadError::Invalid(
                    "bootstrap.admin_user needs a username and password".into(),
                ));
            }
        }
        for app in &self.bootstrap.applications {
            if app.client_id.trim().is_empty() {
                return Err(ConfigLoadError::Invalid(format!(
                    "bootstrap application '{}' has no client_id",
                    app.name
                )));
            }
        }
        self.auth.validate()?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis configuration for sharing sessions and tickets across instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Falls back to the in-process store when disabled or unreachable
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_redis_url")]
    pub url: String,

    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// In-process store housekeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_purge_interval", with = "humantime_serde")]
    pub purge_interval: Duration,
}

fn default_purge_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            purge_interval: default_purge_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BootstrapConfig {
    /// Created at startup and granted super_admin
    #[serde(default)]
    pub admin_user: Option<AdminUserConfig>,
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserConfig {
    pub username: String,
    /// Prefer UAC__BOOTSTRAP__ADMIN_USER__PASSWORD over the file
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub name: String,
    pub client_id: String,
    /// Plain secret, hashed at startup. Omit for public clients.
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub oauth_profile: OAuthProfile,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

pub mod loader {
    use super::{AppConfig, ConfigLoadError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "uac.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigLoadError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., UAC__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("UAC")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: AppConfig = builder.build()?.try_deserialize()?;
        merged.validate()?;
        Ok(merged)
    }
}
