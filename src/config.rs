use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DbConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

/// Bearer validation settings. Tokens are issued by the external identity
/// provider; this service only checks them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    // RS256 tokens validated against the provider's JWKS
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,

    // HS256 shared secret, for providers that sign with one
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Lookback for the patient detail view.
    #[serde(default = "default_history_window_hours")]
    pub history_window_hours: NonZeroU32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            history_window_hours: default_history_window_hours(),
        }
    }
}

fn default_history_window_hours() -> NonZeroU32 {
    NonZeroU32::MIN.saturating_add(5)
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)?;
        let mut cfg = Self::parse(&raw)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database.url = url;
        }

        if let Ok(jwt_secret) = std::env::var("JWT_SECRET") {
            cfg.auth.get_or_insert_with(AuthConfig::default).jwt_secret = Some(jwt_secret);
        }

        Ok(cfg)
    }

    pub fn parse(raw: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_placeholders(raw)?;
        Ok(serde_yaml::from_str(&expanded)?)
    }

    pub fn api_bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// `$$` produces a literal `$`.
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let close = match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        chars.next();

        let mut name = String::new();
        let mut terminated = false;
        for ch in chars.by_ref() {
            if ch == close {
                terminated = true;
                break;
            }
            name.push(ch);
        }
        if !terminated {
            anyhow::bail!("unterminated env placeholder: missing '{}'", close);
        }

        let value = std::env::var(&name)
            .with_context(|| format!("missing environment variable: {}", name))?;
        out.push_str(&value);
    }

    Ok(out)
}
