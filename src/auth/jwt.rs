use alcoholic_jwt::{validate, Validation as JwksValidation, ValidationError, JWKS};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // hospital account
    pub exp: usize,
    pub iat: Option<usize>,
    pub iss: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to fetch JWKS: {0}")]
    Jwks(#[from] reqwest::Error),

    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token rejected: {0:?}")]
    Rejected(ValidationError),
}

/// Validates RS256 tokens against the identity provider's published keys.
#[derive(Clone)]
pub struct JwtValidator {
    jwks: Arc<RwLock<JWKS>>,
    issuer: Option<String>,
}

impl JwtValidator {
    pub async fn new(jwks_url: &str, issuer: Option<String>) -> Result<Self, AuthError> {
        let jwks = fetch_jwks(jwks_url).await?;
        Ok(Self::from_jwks(jwks, issuer))
    }

    pub fn from_jwks(jwks: JWKS, issuer: Option<String>) -> Self {
        Self {
            jwks: Arc::new(RwLock::new(jwks)),
            issuer,
        }
    }

    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validations = vec![JwksValidation::SubjectPresent, JwksValidation::NotExpired];
        if let Some(issuer) = &self.issuer {
            validations.push(JwksValidation::Issuer(issuer.clone()));
        }

        let kid = alcoholic_jwt::token_kid(token)
            .map_err(AuthError::Rejected)?
            .ok_or(AuthError::Rejected(ValidationError::InvalidSignature))?;

        let jwks = self.jwks.read().await;
        let jwk = jwks
            .find(&kid)
            .ok_or(AuthError::Rejected(ValidationError::InvalidSignature))?;

        let valid_jwt = validate(token, jwk, validations).map_err(AuthError::Rejected)?;

        serde_json::from_value(valid_jwt.claims)
            .map_err(|_| AuthError::Rejected(ValidationError::InvalidSignature))
    }
}

async fn fetch_jwks(url: &str) -> Result<JWKS, AuthError> {
    let jwks: JWKS = reqwest::get(url).await?.error_for_status()?.json().await?;
    Ok(jwks)
}

pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
