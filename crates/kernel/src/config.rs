//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result, ensure};

use crate::locale::Locale;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Secret for verifying session JWTs (required, at least 32 bytes).
    pub auth_secret: String,

    /// Name of the session cookie (default: "session-token").
    pub session_cookie: String,

    /// Default locale tag (default: en-US).
    pub default_locale: Locale,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let auth_secret =
            env::var("AUTH_SECRET").context("AUTH_SECRET environment variable is required")?;
        ensure!(
            auth_secret.len() >= 32,
            "AUTH_SECRET must be at least 32 bytes"
        );

        let session_cookie =
            env::var("SESSION_COOKIE").unwrap_or_else(|_| "session-token".to_string());

        let default_locale = match env::var("DEFAULT_LOCALE") {
            Ok(tag) => Locale::from_tag(&tag)
                .with_context(|| format!("DEFAULT_LOCALE '{tag}' is not a supported locale"))?,
            Err(_) => Locale::EnUs,
        };

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            auth_secret,
            session_cookie,
            default_locale,
            cors_allowed_origins,
        })
    }
}
