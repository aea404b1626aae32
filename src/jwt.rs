//! Access token issuance and verification.
//!
//! Access tokens are short-lived, stateless HS256 JWTs. Nothing is stored
//! server-side, so a token stays valid until it expires; the refresh-token
//! layer in `session` is where revocation happens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};

use crate::clock::Clock;

/// The only accepted signing algorithm.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LENGTH: usize = 16;

/// Longest access token lifetime accepted from configuration.
pub const MAX_ACCESS_TTL_MINUTES: i64 = 24 * 60;

/// JWT claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id as a decimal string)
    pub sub: String,
    pub username: String,
    pub role: String,
    /// Issuer
    pub iss: String,
    /// Audience (a bare string is accepted on input)
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    /// Parse the subject back into a user id.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok().filter(|id| *id > 0)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Settings for the access token codec.
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: Vec<u8>,
    pub issuer: String,
    pub audience: Vec<String>,
    pub access_ttl_minutes: i64,
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: i64,
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: Vec<String>,
    access_ttl_secs: i64,
    clock: Clock,
}

impl JwtCodec {
    pub fn new(settings: &JwtSettings, clock: Clock) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(&settings.secret),
            decoding_key: DecodingKey::from_secret(&settings.secret),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            access_ttl_secs: settings.access_ttl_minutes.saturating_mul(60),
            clock,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Issue an access token for a user.
    pub fn issue(&self, user_id: i64, username: &str, role: &str) -> Result<AccessToken, JwtError> {
        let now = self.clock.now();
        let exp = now.saturating_add(self.access_ttl_secs);

        let claims = AccessClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &self.encoding_key,
        )
        .map_err(JwtError::Encoding)?;

        Ok(AccessToken {
            token,
            expires_at: exp,
        })
    }

    /// Verify an access token and return its claims.
    ///
    /// Checks run in order: algorithm, signature, expiry (no leeway; the
    /// expiry instant itself is already expired), issuer, audience.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        // Expiry, issuer and audience are checked below against our own clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let header = jsonwebtoken::decode_header(token).map_err(JwtError::Decoding)?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(JwtError::WrongAlgorithm);
        }

        let claims =
            jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation)
                .map_err(JwtError::Decoding)?
                .claims;

        if self.clock.now() >= claims.exp {
            return Err(JwtError::Expired);
        }

        if claims.iss != self.issuer {
            return Err(JwtError::IssuerMismatch);
        }

        if !audience_matches(&claims.aud, &self.audience) {
            return Err(JwtError::AudienceMismatch);
        }

        Ok(claims)
    }
}

/// Non-empty intersection required; an empty side never matches.
fn audience_matches(token_aud: &[String], allowed: &[String]) -> bool {
    token_aud.iter().any(|a| allowed.contains(a))
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
    #[error("unexpected signing algorithm")]
    WrongAlgorithm,
    #[error("token expired")]
    Expired,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
}
