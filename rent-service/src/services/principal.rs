//! Principal resolution from bearer credentials.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::models::{Principal, Role};
use crate::services::access::AccessError;

const ACCESS_TOKEN_TYPE: &str = "access";

/// Turns a raw credential into an authenticated principal.
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<Principal, AccessError>;
}

/// Claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user or tenant id)
    pub sub: String,
    pub role: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

/// HS256 access-token verifier.
#[derive(Clone)]
pub struct JwtPrincipalResolver {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

impl JwtPrincipalResolver {
    pub fn new(secret: &Secret<String>, access_token_expiry_minutes: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            access_token_expiry_minutes,
        }
    }

    /// Sign an access token for `principal`. Used by tests and local tooling.
    pub fn issue_access_token(&self, principal: &Principal) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: principal.id.clone(),
            role: principal.role.to_string(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }
}

impl PrincipalResolver for JwtPrincipalResolver {
    fn resolve(&self, credential: &str) -> Result<Principal, AccessError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<AccessTokenClaims>(credential, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected access token");
                AccessError::Unauthenticated
            })?
            .claims;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            tracing::debug!(token_type = %claims.token_type, "Wrong token type");
            return Err(AccessError::Unauthenticated);
        }

        let role: Role = claims.role.parse().map_err(|e: String| {
            tracing::debug!(error = %e, "Token carries unknown role");
            AccessError::Unauthenticated
        })?;

        Ok(Principal {
            id: claims.sub,
            role,
        })
    }
}
