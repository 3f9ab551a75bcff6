//! HTTP routes and shared extractors.

pub mod login;
pub mod password;
pub mod referrals;
pub mod register;

use std::sync::LazyLock;

use axum::Json;
use axum::extract::{FromRequest, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::user::{Identity, UserRepository};
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";

static EMAIL_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Email well-formedness per policy. Failures are soft: callers answer with
/// a normal message payload, not an error status.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SYNTAX.is_match(email)
}

/// Plain message payload, also carrying policy soft-failures.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// JSON body extractor running `validator` rules before the handler.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(
        req: Request,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state).await?;
        body.validate()?;

        Ok(Self(body))
    }
}

/// Custom middleware for authentication.
///
/// Decodes the bearer token, re-resolves its subject to a live user and
/// attaches the [`Identity`] projection to the request.
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;
    let token = token.strip_prefix(BEARER).unwrap_or(token);

    let claims = state
        .token
        .decode(token)
        .map_err(|_| ServerError::Unauthorized)?;

    // A signed token whose subject no longer exists must not pass.
    let user = UserRepository::new(state.db.postgres.clone())
        .find_by_username(&claims.sub)
        .await?
        .ok_or(ServerError::Unauthorized)?;

    req.extensions_mut().insert(Identity::from(user));

    Ok(next.run(req).await)
}

/// Build an application state backed by the test pool.
#[cfg(test)]
pub fn state(pool: sqlx::Pool<sqlx::Postgres>) -> AppState {
    use std::sync::Arc;

    use crate::config::{Argon2, Configuration, Token};
    use crate::credential::PasswordManager;
    use crate::database::Database;
    use crate::mail::MailManager;
    use crate::token::TokenManager;

    let argon2 = Argon2 {
        memory_cost: 1024,
        iterations: 1,
        parallelism: 1,
        hash_length: 32,
    };
    let mut config = Configuration::default();
    config.name = "vouch-test".to_owned();
    config.url = "https://vouch.example.com/".to_owned();
    config.token = Some(Token {
        secret: "test-secret".to_owned(),
        expiry_minutes: None,
        audience: None,
    });
    config.argon2 = Some(argon2.clone());

    AppState {
        token: TokenManager::new(&config.url, "test-secret", None),
        crypto: Arc::new(
            PasswordManager::new(Some(argon2)).expect("argon2 test params"),
        ),
        config: Arc::new(config),
        db: Database { postgres: pool },
        mail: MailManager::default(),
    }
}
