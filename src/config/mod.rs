// src/config/mod.rs
// Service configuration, loaded from the environment (.env supported).

use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct DrawbridgeConfig {
    // ── Server
    pub host: String,
    pub port: u16,

    // ── Provider endpoints (overridable for testing / self-hosted gateways)
    pub openai_base_url: String,
    pub openrouter_base_url: String,
    pub google_base_url: String,
    pub siliconflow_base_url: String,

    // ── Timeouts (seconds)
    pub request_timeout: u64,

    // ── Persisted client configuration
    pub config_path: Option<String>,

    // ── Logging
    pub log_level: String,
}

/// Parse an env var, falling back to `default` when unset or unparseable.
/// Values may carry trailing comments and whitespace.
fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean = val.split('#').next().unwrap_or("").trim();
            match clean.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    tracing::warn!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl DrawbridgeConfig {
    pub fn from_env() -> Self {
        // Best effort; a missing .env just means plain environment variables.
        let _ = dotenvy::dotenv();

        Self {
            host: env_var_or("DRAWBRIDGE_HOST", "0.0.0.0".to_string()),
            port: env_var_or("DRAWBRIDGE_PORT", 3100),
            openai_base_url: env_var_or(
                "OPENAI_BASE_URL",
                "https://api.openai.com/v1".to_string(),
            ),
            openrouter_base_url: env_var_or(
                "OPENROUTER_BASE_URL",
                "https://openrouter.ai/api/v1".to_string(),
            ),
            google_base_url: env_var_or(
                "GOOGLE_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta".to_string(),
            ),
            siliconflow_base_url: env_var_or(
                "SILICONFLOW_BASE_URL",
                "https://api.siliconflow.cn/v1".to_string(),
            ),
            request_timeout: env_var_or("DRAWBRIDGE_REQUEST_TIMEOUT", 60),
            config_path: std::env::var("DRAWBRIDGE_CONFIG_PATH").ok(),
            log_level: env_var_or("DRAWBRIDGE_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = DrawbridgeConfig::from_env();

        assert_eq!(config.request_timeout, 60);
        assert!(config.openai_base_url.starts_with("http"));
        assert!(config.siliconflow_base_url.starts_with("http"));
    }

    #[test]
    fn test_bind_address() {
        let config = DrawbridgeConfig::from_env();
        assert!(config.bind_address().contains(':'));
    }

    #[test]
    fn test_env_var_or_strips_comments() {
        unsafe { std::env::set_var("DB_TEST_TIMEOUT", "30 # seconds") };
        let parsed: u64 = env_var_or("DB_TEST_TIMEOUT", 0);
        assert_eq!(parsed, 30);
        unsafe { std::env::remove_var("DB_TEST_TIMEOUT") };
    }
}
