use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{appresult::AppError, models::Role};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("could not sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => AppError::Internal(anyhow::Error::from(err)),
            TokenError::Expired | TokenError::Invalid(_) => AppError::Unauthorized(err.to_string()),
        }
    }
}

/// Token payload. `sub` is the principal's row id in the table picked by `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 keys derived from the server secret, plus the token lifetime.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue_token(&self, principal_id: i64, role: Role) -> Result<String, TokenError> {
        self.issue_token_at(principal_id, role, OffsetDateTime::now_utc())
    }

    pub fn issue_token_at(
        &self,
        principal_id: i64,
        role: Role,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: principal_id.to_string(),
            role,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + self.ttl).unix_timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify_token(&self, token: &str) -> Result<(i64, Role), TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(decoded) => decoded.claims,
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => return Err(TokenError::Expired),
                _ => return Err(TokenError::Invalid(e.to_string())),
            },
        };

        let principal_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::Invalid(format!("subject {:?} is not an id", claims.sub)))?;
        Ok((principal_id, claims.role))
    }
}
