use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "chatline.toml",
    "config/chatline.toml",
    "crates/config/chatline.toml",
    "../chatline.toml",
    "../config/chatline.toml",
    "../crates/config/chatline.toml",
];

const DEV_JWT_SECRET: &str = "chatline-development-secret-change-me";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://chatline.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Token signing and one-time code settings.
///
/// ```
/// use chatline_config::AuthConfig;
///
/// let auth = AuthConfig::default();
/// assert_eq!(auth.issuer, "chatline");
/// assert_eq!(auth.token_ttl_seconds, 86_400);
/// assert_eq!(auth.otp_ttl_seconds, 300);
/// assert_eq!(auth.otp_max_attempts, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_issuer")]
    pub issuer: String,
    #[serde(default = "AuthConfig::default_audience")]
    pub audience: String,
    #[serde(default = "AuthConfig::default_token_ttl")]
    pub token_ttl_seconds: u64,
    #[serde(default = "AuthConfig::default_otp_ttl")]
    pub otp_ttl_seconds: u64,
    /// Wrong guesses allowed before an outstanding code is revoked.
    #[serde(default = "AuthConfig::default_otp_max_attempts")]
    pub otp_max_attempts: u32,
}

impl AuthConfig {
    fn default_issuer() -> String {
        "chatline".to_string()
    }

    fn default_audience() -> String {
        "chatline-clients".to_string()
    }

    const fn default_token_ttl() -> u64 {
        86_400
    }

    const fn default_otp_ttl() -> u64 {
        300
    }

    const fn default_otp_max_attempts() -> u32 {
        5
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            issuer: Self::default_issuer(),
            audience: Self::default_audience(),
            token_ttl_seconds: Self::default_token_ttl(),
            otp_ttl_seconds: Self::default_otp_ttl(),
            otp_max_attempts: Self::default_otp_max_attempts(),
        }
    }
}

/// Live connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound event queue. Events that do not
    /// fit are dropped for that connection.
    #[serde(default = "RealtimeConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl RealtimeConfig {
    const fn default_outbound_buffer() -> usize {
        100
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: Self::default_outbound_buffer(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.auth.jwt_secret.trim().is_empty(),
            "auth.jwt_secret must not be empty"
        );
        ensure!(
            self.auth.token_ttl_seconds > 0,
            "auth.token_ttl_seconds must be positive"
        );
        ensure!(
            self.auth.otp_ttl_seconds > 0,
            "auth.otp_ttl_seconds must be positive"
        );
        ensure!(
            self.auth.otp_max_attempts > 0,
            "auth.otp_max_attempts must be positive"
        );
        ensure!(
            self.database.max_connections > 0,
            "database.max_connections must be positive"
        );
        ensure!(
            self.realtime.outbound_buffer > 0,
            "realtime.outbound_buffer must be positive"
        );
        Ok(())
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use chatline_config::load;
///
/// std::env::remove_var("CHATLINE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret.clone())?
        .set_default("auth.issuer", defaults.auth.issuer.clone())?
        .set_default("auth.audience", defaults.auth.audience.clone())?
        .set_default(
            "auth.token_ttl_seconds",
            clamp_i64(defaults.auth.token_ttl_seconds),
        )?
        .set_default(
            "auth.otp_ttl_seconds",
            clamp_i64(defaults.auth.otp_ttl_seconds),
        )?
        .set_default(
            "auth.otp_max_attempts",
            i64::from(defaults.auth.otp_max_attempts),
        )?
        .set_default(
            "realtime.outbound_buffer",
            clamp_i64(defaults.realtime.outbound_buffer as u64),
        )?;

    let environment_overrides = config::Environment::with_prefix("CHATLINE").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("CHATLINE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CHATLINE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    config.validate().context("invalid configuration")?;

    debug!(
        http.address = %config.http.address,
        http.port = config.http.port,
        database.url = %config.database.url,
        "loaded chatline configuration"
    );
    Ok(config)
}
