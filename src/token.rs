//! Manage json web tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const DEFAULT_AUDIENCE: &str = "vouch";
pub const DEFAULT_EXPIRY_MINUTES: u64 = 15;

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for.
    pub aud: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing. Seconds since Unix epoch.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identifies the organization that issued the JWT.
    pub iss: String,
    /// Username of the authenticated account.
    pub sub: String,
}

/// Manage JWT tokens.
///
/// Signature secret and lifetime are deployment configuration.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    name: String,
    audience: String,
    expiry: u64,
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    pub fn new(name: &str, secret: &str, expiry_minutes: Option<u64>) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            name: name.to_owned(),
            audience: DEFAULT_AUDIENCE.to_string(),
            expiry: expiry_minutes.unwrap_or(DEFAULT_EXPIRY_MINUTES) * 60,
        }
    }

    /// Set `audience` field on JWT.
    pub fn audience(&mut self, audience: &str) {
        self.audience = audience.to_owned();
    }

    /// Token lifetime in seconds.
    pub fn expires_in(&self) -> u64 {
        self.expiry
    }

    /// Create a new [`jsonwebtoken`] with the username as subject.
    pub fn create(&self, username: &str) -> Result<String> {
        let time =
            SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let header = Header::new(self.algorithm);
        let claims = Claims {
            aud: self.audience.clone(),
            exp: time + self.expiry,
            iat: time,
            iss: self.name.clone(),
            sub: username.to_owned(),
        };

        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Decode and check a token.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[&self.audience]);

        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_create_and_decode() {
        let manager = TokenManager::new("https://example.com/", SECRET, None);

        let token = manager.create("alice").unwrap();
        let claims = manager.decode(&token).unwrap();

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, "https://example.com/");
        assert!(claims.exp > now);
        assert_eq!(claims.exp - claims.iat, DEFAULT_EXPIRY_MINUTES * 60);
    }

    #[test]
    fn test_rejects_tampered_token() {
        let manager = TokenManager::new("https://example.com/", SECRET, None);
        let other = TokenManager::new("https://example.com/", "another", None);

        let token = manager.create("alice").unwrap();
        assert!(other.decode(&token).is_err());

        let mut truncated = token.clone();
        truncated.pop();
        assert!(manager.decode(&truncated).is_err());
    }

    #[test]
    fn test_rejects_expired_token() {
        let manager = TokenManager::new("https://example.com/", SECRET, None);

        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = Claims {
            aud: DEFAULT_AUDIENCE.to_string(),
            exp: time - 3600,
            iat: time - 7200,
            iss: "https://example.com/".to_string(),
            sub: "alice".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(manager.decode(&token).is_err());
    }
}
