/// Configuration management for Blog Service
///
/// Configuration is read from environment variables (a `.env` file is loaded
/// by the binary before this runs).
use db_pool::parse_env_with_default;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Signing secret used outside production when `JWT_SECRET` is unset.
pub const DEV_JWT_SECRET: &str = "blog-service-dev-secret";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Uploaded media configuration
    pub media: MediaConfig,
    /// Page cache configuration
    pub cache: CacheConfig,
    /// Authentication collaborator settings
    pub auth: AuthConfig,
    /// Log output configuration
    pub logging: LoggingConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// HTTP worker count
    pub workers: usize,
}

/// Database configuration; pool sizing and timeouts are read by
/// `db_pool::DbConfig` from the `DB_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory uploaded files are written below
    pub root: PathBuf,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a cached listing page
    pub page_ttl_secs: u64,
    /// Distinct URLs kept before the oldest pages are evicted
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the auth provider
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// Lifetime of tokens issued by the admin CLI
    pub token_expiry_secs: i64,
    /// Where anonymous users are sent for protected pages
    pub login_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let is_production = app_env.eq_ignore_ascii_case("production");

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("BLOG_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_with_default("BLOG_SERVICE_PORT", 8080),
                workers: parse_env_with_default("BLOG_SERVICE_WORKERS", 4),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://blog.db?mode=rwc".to_string()),
            },
            media: MediaConfig {
                root: std::env::var("MEDIA_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("media")),
                max_upload_bytes: parse_env_with_default("MEDIA_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            },
            cache: CacheConfig {
                page_ttl_secs: parse_env_with_default("PAGE_CACHE_TTL_SECS", 20),
                max_entries: parse_env_with_default("PAGE_CACHE_MAX_ENTRIES", 1024),
            },
            auth: {
                let jwt_secret = match std::env::var("JWT_SECRET") {
                    Ok(value) if !value.trim().is_empty() => value,
                    _ if is_production => {
                        return Err("JWT_SECRET must be set in production".to_string())
                    }
                    _ => DEV_JWT_SECRET.to_string(),
                };

                if is_production && jwt_secret == DEV_JWT_SECRET {
                    return Err("JWT_SECRET cannot be the development secret in production".to_string());
                }

                AuthConfig {
                    jwt_secret,
                    token_expiry_secs: parse_env_with_default("JWT_EXPIRY_SECS", 86_400),
                    login_url: std::env::var("LOGIN_URL")
                        .unwrap_or_else(|_| "/auth/login/".to_string()),
                }
            },
            logging: LoggingConfig {
                json: std::env::var("LOG_FORMAT")
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for key in [
            "APP_ENV",
            "BLOG_SERVICE_PORT",
            "JWT_SECRET",
            "PAGE_CACHE_TTL_SECS",
            "PAGE_CACHE_MAX_ENTRIES",
            "LOGIN_URL",
            "LOG_FORMAT",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial_test::serial]
    fn defaults_in_development() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.cache.page_ttl_secs, 20);
        assert_eq!(config.cache.max_entries, 1024);
        assert_eq!(config.auth.login_url, "/auth/login/");
        assert_eq!(config.auth.jwt_secret, DEV_JWT_SECRET);
        assert!(!config.logging.json);
    }

    #[test]
    #[serial_test::serial]
    fn production_requires_secret() {
        clear_env();
        std::env::set_var("APP_ENV", "production");
        assert!(Config::from_env().is_err());

        std::env::set_var("JWT_SECRET", DEV_JWT_SECRET);
        assert!(Config::from_env().is_err());

        std::env::set_var("JWT_SECRET", "a-real-secret");
        let config = Config::from_env().unwrap();
        assert_eq!(config.auth.jwt_secret, "a-real-secret");
        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn overrides_from_env() {
        clear_env();
        std::env::set_var("PAGE_CACHE_TTL_SECS", "5");
        std::env::set_var("PAGE_CACHE_MAX_ENTRIES", "64");
        std::env::set_var("LOG_FORMAT", "JSON");
        let config = Config::from_env().unwrap();
        assert_eq!(config.cache.page_ttl_secs, 5);
        assert_eq!(config.cache.max_entries, 64);
        assert!(config.logging.json);
        clear_env();
    }
}
