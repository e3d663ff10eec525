use anyhow::{anyhow, Context};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{env, fmt::Display, str::FromStr};

use crate::utils::cookies::{CookieOptions, SameSite};
use crate::utils::token::MIN_BYTES_PER_TOKEN;

/// Longest accepted password reset lifetime: ten years.
pub const MAX_PASSWORD_RESET_TTL_MINUTES: i64 = 10 * 365 * 24 * 60;
/// Longest accepted absolute session lifetime: ten years.
pub const MAX_SESSION_TTL_HOURS: i64 = 10 * 365 * 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    /// Log outgoing mail instead of delivering it.
    pub skip_send: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    /// Public base URL used when composing links sent by email.
    pub app_base_url: String,
    pub bind_addr: String,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub cors_allow_origins: Vec<String>,
    pub token_bytes: usize,
    pub password_reset_ttl_minutes: i64,
    /// Absolute session lifetime. `None` keeps sessions until sign-out.
    pub session_ttl_hours: Option<i64>,
    pub session_single_per_user: bool,
    pub password_min_length: usize,
    pub smtp: SmtpConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/accounts".to_string());
        let app_base_url = env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&app_base_url)
            .with_context(|| format!("Invalid APP_BASE_URL value: {}", app_base_url))?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let cookie_secure = parse_env("COOKIE_SECURE", false)?;
        let cookie_same_site = parse_env("COOKIE_SAME_SITE", SameSite::Lax)?;
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec![app_base_url.clone()]);

        let token_bytes: usize = parse_env("TOKEN_BYTES", MIN_BYTES_PER_TOKEN)?;
        if token_bytes < MIN_BYTES_PER_TOKEN {
            return Err(anyhow!(
                "TOKEN_BYTES must be at least {}, got {}",
                MIN_BYTES_PER_TOKEN,
                token_bytes
            ));
        }

        let password_reset_ttl_minutes: i64 = parse_env("PASSWORD_RESET_TTL_MINUTES", 60)?;
        if !(1..=MAX_PASSWORD_RESET_TTL_MINUTES).contains(&password_reset_ttl_minutes) {
            return Err(anyhow!(
                "PASSWORD_RESET_TTL_MINUTES must be between 1 and {}, got {}",
                MAX_PASSWORD_RESET_TTL_MINUTES,
                password_reset_ttl_minutes
            ));
        }

        let session_ttl_hours = match env::var("SESSION_TTL_HOURS") {
            Ok(raw) if !raw.trim().is_empty() => {
                let hours: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("Invalid SESSION_TTL_HOURS value: {}", raw))?;
                if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
                    return Err(anyhow!(
                        "SESSION_TTL_HOURS must be between 1 and {}, got {}",
                        MAX_SESSION_TTL_HOURS,
                        hours
                    ));
                }
                Some(hours)
            }
            _ => None,
        };
        let session_single_per_user = parse_env("SESSION_SINGLE_PER_USER", true)?;
        let password_min_length = parse_env("PASSWORD_MIN_LENGTH", 8)?;

        let smtp = SmtpConfig {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: parse_env("SMTP_PORT", 587)?,
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_address: env::var("SMTP_FROM_ADDRESS")
                .unwrap_or_else(|_| "support@accounts.local".to_string()),
            skip_send: parse_env("SMTP_SKIP_SEND", false)?,
        };

        Ok(Config {
            database_url,
            app_base_url,
            bind_addr,
            cookie_secure,
            cookie_same_site,
            cors_allow_origins,
            token_bytes,
            password_reset_ttl_minutes,
            session_ttl_hours,
            session_single_per_user,
            password_min_length,
            smtp,
        })
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            secure: self.cookie_secure,
            same_site: self.cookie_same_site,
        }
    }

    pub fn password_reset_duration(&self) -> Duration {
        Duration::minutes(self.password_reset_ttl_minutes)
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_hours.map(Duration::hours)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Config {
    /// Defaults for in-process tests. Nothing here reaches a real service.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/accounts_test".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            cookie_secure: false,
            cookie_same_site: SameSite::Lax,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            token_bytes: MIN_BYTES_PER_TOKEN,
            password_reset_ttl_minutes: 60,
            session_ttl_hours: None,
            session_single_per_user: true,
            password_min_length: 8,
            smtp: SmtpConfig {
                host: "localhost".to_string(),
                port: 2525,
                username: String::new(),
                password: String::new(),
                from_address: "support@accounts.local".to_string(),
                skip_send: true,
            },
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {} value {:?}: {}", key, raw, e)),
        _ => Ok(default),
    }
}
