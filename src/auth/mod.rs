pub mod jwt;

pub use jwt::{validate_token, AuthError, Claims, JwtValidator};

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::error::AppError;

pub const PROXY_USER_HEADER: &str = "x-auth-request-user";
pub const PROXY_EMAIL_HEADER: &str = "x-auth-request-email";

/// The hospital account a request acts for. Its subject owns the patients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub subject: String,
    pub email: Option<String>,
}

/// How callers prove who they are.
pub enum Authenticator {
    /// RS256 bearer tokens checked against the provider's JWKS.
    Jwks(JwtValidator),
    /// HS256 bearer tokens signed with a shared secret.
    Secret(String),
    /// Identity asserted by the ingress proxy headers.
    Proxy,
}

impl Authenticator {
    pub async fn from_config(config: Option<&AuthConfig>) -> Result<Self, AuthError> {
        let Some(config) = config else {
            info!("No auth configured, trusting proxy headers");
            return Ok(Authenticator::Proxy);
        };

        if let Some(jwks_url) = &config.jwks_url {
            let validator = JwtValidator::new(jwks_url, config.issuer.clone()).await?;
            info!(jwks_url = %jwks_url, "JWKS validator initialized");
            return Ok(Authenticator::Jwks(validator));
        }
        if let Some(secret) = &config.jwt_secret {
            info!("HS256 validation with shared secret");
            return Ok(Authenticator::Secret(secret.clone()));
        }

        info!("No token validation configured, trusting proxy headers");
        Ok(Authenticator::Proxy)
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, AppError> {
        let claims = match self {
            Authenticator::Proxy => return proxy_user(headers).ok_or(AppError::Unauthorized),
            Authenticator::Jwks(validator) => {
                let token = bearer(headers)?;
                validator.validate_token(token).await
            }
            Authenticator::Secret(secret) => {
                let token = bearer(headers)?;
                validate_token(token, secret)
            }
        }
        .map_err(|e| {
            debug!("JWT validation failed: {}", e);
            AppError::Unauthorized
        })?;

        Ok(AuthenticatedUser {
            subject: claims.sub,
            email: claims.email,
        })
    }
}

/// The token of an `Authorization: Bearer <token>` header. The scheme is
/// matched case-sensitively and an empty token is treated as absent.
pub fn extract_bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn bearer(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .ok_or_else(|| {
            debug!("No valid Authorization header found");
            AppError::Unauthorized
        })
}

fn proxy_user(headers: &HeaderMap) -> Option<AuthenticatedUser> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let subject = header(PROXY_USER_HEADER)?;
    debug!("Authenticated via proxy: {}", subject);
    Some(AuthenticatedUser {
        subject,
        email: header(PROXY_EMAIL_HEADER),
    })
}
