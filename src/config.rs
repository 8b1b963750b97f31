use crate::models::COLLECTIONS;
use std::env;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Config {
    // Token signing
    pub jwt_secret: String,
    pub token_ttl_secs: u64,

    // Login credential
    pub auth_username: String,
    pub auth_password: String,
    pub auth_role: String,

    // Redis
    pub redis_url: String,

    // Server
    pub bind_addr: SocketAddr,
    pub max_body_bytes: usize,
    pub cors_permissive: bool,

    // Collections behind the access gate
    pub protected_collections: Vec<String>,

    // Rate limiting (0 disables)
    pub rate_limit_login_per_min: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("auth_username", &self.auth_username)
            .field("auth_password", &"[REDACTED]")
            .field("auth_role", &self.auth_role)
            .field("redis_url", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("cors_permissive", &self.cors_permissive)
            .field("protected_collections", &self.protected_collections)
            .field("rate_limit_login_per_min", &self.rate_limit_login_per_min)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        let _ = dotenvy::dotenv();

        // Token signing - JWT_SECRET is required, there is no fallback
        let jwt_secret = required_non_empty("JWT_SECRET")?;
        let token_ttl_secs: u64 = parse_env_or_default("TOKEN_TTL_SECS", 3600)?;
        if token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_TTL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let auth_username = env::var("AUTH_USERNAME").unwrap_or_else(|_| "admin".to_string());
        if auth_username.is_empty() {
            return Err(ConfigError::InvalidValue(
                "AUTH_USERNAME".to_string(),
                "cannot be empty".to_string(),
            ));
        }
        let auth_password = required_non_empty("AUTH_PASSWORD")?;
        let auth_role = env::var("AUTH_ROLE").unwrap_or_else(|_| "Manager".to_string());

        let redis_url =
            env::var("REDIS_URL").map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;
        let max_body_bytes = parse_env_or_default("MAX_BODY_BYTES", 1_048_576)?;
        let cors_permissive = parse_env_or_default("CORS_PERMISSIVE", true)?;

        let protected_str =
            env::var("PROTECTED_COLLECTIONS").unwrap_or_else(|_| "customers".to_string());
        let protected_collections: Vec<String> = protected_str
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(unknown) = protected_collections
            .iter()
            .find(|c| !COLLECTIONS.contains(&c.as_str()))
        {
            return Err(ConfigError::InvalidValue(
                "PROTECTED_COLLECTIONS".to_string(),
                format!("unknown collection '{}'", unknown),
            ));
        }

        let rate_limit_login_per_min = parse_env_or_default("RATE_LIMIT_LOGIN_PER_MIN", 10)?;

        Ok(Config {
            jwt_secret,
            token_ttl_secs,
            auth_username,
            auth_password,
            auth_role,
            redis_url,
            bind_addr,
            max_body_bytes,
            cors_permissive,
            protected_collections,
            rate_limit_login_per_min,
        })
    }

    /// Whether requests to `collection` must pass the access gate.
    pub fn is_protected(&self, collection: &str) -> bool {
        self.protected_collections.iter().any(|c| c == collection)
    }
}

fn required_non_empty(key: &str) -> Result<String, ConfigError> {
    let value = env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "cannot be empty".to_string(),
        ));
    }
    Ok(value)
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
