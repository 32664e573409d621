use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Verifies HS256 tokens minted by the identity service
///
/// Registered as app data; the [`RequesterId`] extractor reads it from there.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
    issuer: Option<String>,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: Option<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(iss) = &issuer {
            validation.set_issuer(&[iss.as_str()]);
        }

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer,
        }
    }

    /// Validate a token and return the user id in its `sub` claim
    pub fn verify(&self, token: &str) -> Result<String, EngineError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| EngineError::Unauthorized(format!("invalid token: {}", e)))?;

        if data.claims.sub.trim().is_empty() {
            return Err(EngineError::Unauthorized("token has no subject".into()));
        }

        Ok(data.claims.sub)
    }

    /// Mint a token for `user_id`, valid for `ttl_secs`; used by tooling and tests
    pub fn issue(&self, user_id: &str, ttl_secs: i64) -> Result<String, EngineError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now().timestamp() + ttl_secs).max(0) as usize,
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| EngineError::Unauthorized(format!("cannot sign token: {}", e)))
    }
}

/// Authenticated user id taken from the bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterId(pub String);

impl RequesterId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for RequesterId {
    type Error = EngineError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_requester(req))
    }
}

fn extract_requester(req: &HttpRequest) -> Result<RequesterId, EngineError> {
    let verifier = req
        .app_data::<web::Data<TokenVerifier>>()
        .ok_or_else(|| EngineError::DependencyFailure("token verifier not configured".into()))?;

    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .ok_or_else(|| EngineError::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| EngineError::Unauthorized("invalid Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| EngineError::Unauthorized("expected a bearer token".into()))?;

    verifier.verify(token.trim()).map(RequesterId)
}
