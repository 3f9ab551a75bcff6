//! Account registration with referral tracking.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::AppState;
use crate::credential::PasswordStrength;
use crate::error::{Result, ServerError};
use crate::referral::CodeAllocator;
use crate::router::{Valid, is_valid_email};
use crate::user::{NewAccount, ReferralAward, User, UserRepository};

/// Transaction retries after storage-level code collisions.
const MAX_INSERT_RETRIES: usize = 3;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(
        min = 3,
        max = 20,
        message = "Username must be 3 to 20 characters long."
    ))]
    pub username: String,
    pub email: String,
    #[validate(length(
        min = 6,
        max = 50,
        message = "Password must be 6 to 50 characters long."
    ))]
    pub password: String,
    #[validate(length(
        min = 6,
        max = 10,
        message = "Referral code must be 6 to 10 characters long."
    ))]
    pub referral_code: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

impl Response {
    fn created(referral_code: String) -> Self {
        Self {
            message: "User registered successfully!".to_owned(),
            referral_code: Some(referral_code),
        }
    }

    /// Policy soft-failure: a normal response carrying the reason, not an
    /// error status.
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            referral_code: None,
        }
    }
}

fn invalid_username() -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.add(
        "username",
        ValidationError::new("username")
            .with_message("Username must be alphanumeric.".into()),
    );
    errors
}

/// When the conflicting row itself holds the supplied referral code, the
/// caller tried to refer themselves; report that instead of a plain
/// duplicate.
fn conflict(
    existing: &User,
    referral_code: Option<&str>,
    fallback: ServerError,
) -> ServerError {
    if referral_code.is_some_and(|code| code == existing.referral_code) {
        ServerError::SelfReferral
    } else {
        fallback
    }
}

/// Handler to register a new account.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    if !body
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(invalid_username().into());
    }

    let repo = UserRepository::new(state.db.postgres.clone());

    if let Some(existing) = repo.find_by_email(&body.email).await? {
        return Err(conflict(
            &existing,
            body.referral_code.as_deref(),
            ServerError::DuplicateEmail,
        ));
    }
    if let Some(existing) = repo.find_by_username(&body.username).await? {
        return Err(conflict(
            &existing,
            body.referral_code.as_deref(),
            ServerError::DuplicateUsername,
        ));
    }

    let referrer = match body.referral_code.as_deref() {
        Some(code) => Some(
            repo.find_by_referral_code(code)
                .await?
                .ok_or(ServerError::InvalidReferralCode)?,
        ),
        None => None,
    };

    let strength = PasswordStrength::classify(&body.password);
    if !strength.is_acceptable() {
        return Ok(Json(Response::rejected(format!(
            "{strength} Password Entered!"
        ))));
    }

    if !is_valid_email(&body.email) {
        return Ok(Json(Response::rejected("Enter a valid Email")));
    }

    let password_hash = state.crypto.hash_password(&body.password)?;

    let allocator = CodeAllocator::new(repo.clone());
    let award = referrer.as_ref().map(|referrer| ReferralAward {
        referrer_id: referrer.id,
        reward_type: &state.config.referral.reward_type,
        reward_amount: state.config.referral.reward_amount,
    });

    for _ in 0..MAX_INSERT_RETRIES {
        let referral_code = allocator.allocate().await?;
        let account = NewAccount {
            username: &body.username,
            email: &body.email,
            password_hash: &password_hash,
            referral_code: &referral_code,
            referred_by: referrer.as_ref().map(|r| r.referral_code.as_str()),
        };

        match repo.insert(&account, award.as_ref()).await {
            Ok(id) => {
                tracing::info!(
                    user_id = id,
                    referred = referrer.is_some(),
                    "user registered"
                );

                return Ok(Json(Response::created(referral_code)));
            },
            // Lost the insert race on the code; regenerate and retry.
            Err(err) if err.is_referral_code_collision() => continue,
            Err(err) => return Err(err),
        }
    }

    Err(ServerError::ExhaustedAllocationSpace)
}
