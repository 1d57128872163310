/// Configuration management for Blog Service
///
/// All settings come from environment variables (optionally loaded from a
/// `.env` file by the binary). Production deployments must provide secrets
/// explicitly; development falls back to local defaults.
use crate::db::DbConfig;
use crate::search::ElasticsearchConfig;
use crate::services::{PostServiceConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEV_JWT_SECRET: &str = "dev-only-blog-service-secret-change-me";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Cache (Redis) configuration
    pub cache: CacheConfig,
    /// Search (Elasticsearch) configuration
    pub search: SearchConfig,
    /// Token settings
    pub auth: AuthConfig,
    /// Post synchronization settings
    pub posts: PostsConfig,
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
    /// Emit JSON log lines
    pub json_logs: bool,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

/// Cache (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub url: String,
}

/// Search (Elasticsearch) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub post_index: String,
    pub post_alias: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

/// Post synchronization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsConfig {
    pub cache_ttl_secs: u64,
    pub search_cache_ttl_secs: u64,
    pub store_timeout_ms: u64,
    pub sync_timeout_ms: u64,
    pub sync_retry_attempts: u32,
    pub sync_retry_backoff_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("BLOG_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("BLOG_SERVICE_PORT", 8080)?,
                json_logs: std::env::var("LOG_FORMAT")
                    .map(|v| v.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if production => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if production && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/blog".to_string()),
                max_connections: parse_env_or_default("DATABASE_MAX_CONNECTIONS", 20)?,
                min_connections: parse_env_or_default("DB_MIN_CONNECTIONS", 5)?,
                connect_timeout_secs: parse_env_or_default("DB_CONNECT_TIMEOUT_SECS", 5)?,
                acquire_timeout_secs: parse_env_or_default("DB_ACQUIRE_TIMEOUT_SECS", 10)?,
                idle_timeout_secs: parse_env_or_default("DB_IDLE_TIMEOUT_SECS", 600)?,
                max_lifetime_secs: parse_env_or_default("DB_MAX_LIFETIME_SECS", 1800)?,
                run_migrations: parse_env_or_default("RUN_MIGRATIONS", true)?,
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
            search: {
                let post_index = std::env::var("ELASTICSEARCH_POST_INDEX")
                    .unwrap_or_else(|_| "posts".to_string());
                let post_alias = std::env::var("ELASTICSEARCH_POST_ALIAS")
                    .unwrap_or_else(|_| format!("{}_alias", post_index));

                SearchConfig {
                    url: std::env::var("ELASTICSEARCH_URL")
                        .unwrap_or_else(|_| "http://localhost:9200".to_string()),
                    username: std::env::var("ELASTICSEARCH_USERNAME").ok(),
                    password: std::env::var("ELASTICSEARCH_PASSWORD").ok(),
                    post_index,
                    post_alias,
                }
            },
            auth: {
                let jwt_secret = match std::env::var("JWT_SECRET") {
                    Ok(secret) if production && secret.len() < 32 => {
                        return Err(
                            "JWT_SECRET must be at least 32 characters in production".to_string()
                        )
                    }
                    Ok(secret) => secret,
                    Err(_) if production => {
                        return Err("JWT_SECRET must be set in production".to_string())
                    }
                    Err(_) => DEV_JWT_SECRET.to_string(),
                };

                AuthConfig {
                    jwt_secret,
                    token_ttl_secs: parse_env_or_default("JWT_TTL_SECS", 3600)?,
                }
            },
            posts: PostsConfig {
                cache_ttl_secs: parse_env_or_default("POST_CACHE_TTL_SECS", 3600)?,
                search_cache_ttl_secs: parse_env_or_default("SEARCH_CACHE_TTL_SECS", 3600)?,
                store_timeout_ms: parse_env_or_default("STORE_TIMEOUT_MS", 5_000)?,
                sync_timeout_ms: parse_env_or_default("SYNC_TIMEOUT_MS", 2_000)?,
                sync_retry_attempts: parse_env_or_default("SYNC_RETRY_ATTEMPTS", 0)?,
                sync_retry_backoff_ms: parse_env_or_default("SYNC_RETRY_BACKOFF_MS", 100)?,
            },
        })
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            connect_timeout_secs: self.database.connect_timeout_secs,
            acquire_timeout_secs: self.database.acquire_timeout_secs,
            idle_timeout_secs: self.database.idle_timeout_secs,
            max_lifetime_secs: self.database.max_lifetime_secs,
        }
    }

    pub fn elasticsearch_config(&self) -> ElasticsearchConfig {
        ElasticsearchConfig {
            url: self.search.url.clone(),
            username: self.search.username.clone(),
            password: self.search.password.clone(),
            index: self.search.post_index.clone(),
            alias: self.search.post_alias.clone(),
        }
    }

    pub fn post_service_config(&self) -> PostServiceConfig {
        PostServiceConfig {
            post_ttl: Duration::from_secs(self.posts.cache_ttl_secs),
            search_ttl: Duration::from_secs(self.posts.search_cache_ttl_secs),
            store_timeout: Duration::from_millis(self.posts.store_timeout_ms),
            sync_timeout: Duration::from_millis(self.posts.sync_timeout_ms),
            sync_retry: RetryConfig {
                max_retries: self.posts.sync_retry_attempts,
                initial_backoff: Duration::from_millis(self.posts.sync_retry_backoff_ms),
                ..RetryConfig::default()
            },
        }
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const TOUCHED: &[&str] = &[
        "APP_ENV",
        "CORS_ALLOWED_ORIGINS",
        "JWT_SECRET",
        "BLOG_SERVICE_PORT",
        "ELASTICSEARCH_POST_INDEX",
        "ELASTICSEARCH_POST_ALIAS",
        "SYNC_RETRY_ATTEMPTS",
    ];

    fn clear_env() {
        for key in TOUCHED {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_development_defaults() {
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.app.port, 8080);
        assert_eq!(config.search.post_index, "posts");
        assert_eq!(config.search.post_alias, "posts_alias");
        assert_eq!(config.posts.cache_ttl_secs, 3600);
        assert_eq!(config.post_service_config().sync_retry.max_retries, 0);
    }

    #[test]
    #[serial]
    fn test_production_requires_jwt_secret() {
        clear_env();
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "https://blog.example.com");

        let result = Config::from_env();
        clear_env();

        assert!(result.unwrap_err().contains("JWT_SECRET"));
    }

    #[test]
    #[serial]
    fn test_production_rejects_wildcard_cors() {
        clear_env();
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "*");

        let result = Config::from_env();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_reported() {
        clear_env();
        std::env::set_var("BLOG_SERVICE_PORT", "eighty");

        let result = Config::from_env();
        clear_env();

        assert!(result.unwrap_err().contains("BLOG_SERVICE_PORT"));
    }

    #[test]
    #[serial]
    fn test_alias_follows_index_name() {
        clear_env();
        std::env::set_var("ELASTICSEARCH_POST_INDEX", "posts_v2");

        let config = Config::from_env().unwrap();
        clear_env();

        assert_eq!(config.search.post_alias, "posts_v2_alias");
    }

    #[test]
    fn test_debug_redacts_jwt_secret() {
        let auth = AuthConfig {
            jwt_secret: "super-secret".to_string(),
            token_ttl_secs: 60,
        };
        assert!(!format!("{:?}", auth).contains("super-secret"));
    }
}
