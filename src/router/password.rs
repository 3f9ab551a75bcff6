//! Password recovery and reset flows.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::credential::{PasswordStrength, generate_temp_password};
use crate::error::{Result, ServerError};
use crate::router::{Notice, Valid};
use crate::user::UserRepository;

const RESET_SUBJECT: &str = "Password Reset Request";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ForgotBody {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ResetBody {
    pub old_username: String,
    pub old_password: String,
    #[validate(length(
        min = 6,
        max = 50,
        message = "Password must be 6 to 50 characters long."
    ))]
    pub new_password: String,
}

fn reset_notice(username: &str, password: &str) -> String {
    format!(
        "Hello {username},\n\n\
        Your password has been reset. Your new password is: {password}\n\n\
        Please change your password immediately after logging in.\n\n\
        If you didn't request this change, please contact support \
        immediately."
    )
}

/// Handler to replace a forgotten password with a mailed temporary one.
pub async fn forgot(
    State(state): State<AppState>,
    Valid(body): Valid<ForgotBody>,
) -> Result<Json<Notice>> {
    let repo = UserRepository::new(state.db.postgres.clone());

    let user = repo
        .find_by_username(&body.username)
        .await?
        .ok_or(ServerError::UnknownUser)?;

    // Exact, case-sensitive match against the stored address.
    if body.email != user.email {
        return Err(ServerError::EmailMismatch);
    }

    let temp_password = generate_temp_password();
    let password_hash = state.crypto.hash_password(&temp_password)?;
    repo.set_password(&user.username, &password_hash).await?;

    // The credential is already swapped here; a delivery failure surfaces
    // as a server error without rolling it back.
    state
        .mail
        .send(
            &user.email,
            RESET_SUBJECT,
            &reset_notice(&user.username, &temp_password),
        )
        .await?;

    Ok(Json(Notice::new(format!(
        "Password sent to {} successfully.",
        user.email
    ))))
}

/// Handler to replace a password after verifying the old credential.
pub async fn reset(
    State(state): State<AppState>,
    Valid(body): Valid<ResetBody>,
) -> Result<Json<Notice>> {
    let repo = UserRepository::new(state.db.postgres.clone());

    let user = repo
        .find_by_username(&body.old_username)
        .await?
        .filter(|user| {
            state
                .crypto
                .verify_password(&body.old_password, &user.password_hash)
        })
        .ok_or(ServerError::InvalidCredentials)?;

    let strength = PasswordStrength::classify(&body.new_password);
    if !strength.is_acceptable() {
        return Ok(Json(Notice::new(format!(
            "{strength} Password Entered!"
        ))));
    }

    let password_hash = state.crypto.hash_password(&body.new_password)?;
    repo.set_password(&user.username, &password_hash).await?;

    Ok(Json(Notice::new("Password Updated Successfully.")))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use sqlx::{Pool, Postgres};

    use super::*;
    use crate::router::login::tests::login;
    use crate::router::register::tests::{
        STRONG_PASSWORD, register, response_json,
    };
    use crate::{app, make_request, router};

    #[sqlx::test]
    async fn test_forgot_password_swaps_credential(pool: Pool<Postgres>) {
        let app = app(router::state(pool));

        register(
            app.clone(),
            "alice",
            "alice@example.com",
            STRONG_PASSWORD,
            None,
        )
        .await;

        let response = make_request(
            app.clone(),
            Method::POST,
            "/forgot-password",
            "application/json",
            None,
            json!({"username": "alice", "email": "alice@example.com"})
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response_json(response).await["message"].as_str(),
            Some("Password sent to alice@example.com successfully.")
        );

        // The previous credential must no longer authenticate.
        let response = login(app, "alice", STRONG_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    async fn test_forgot_password_rejections(pool: Pool<Postgres>) {
        let app = app(router::state(pool));

        register(
            app.clone(),
            "alice",
            "alice@example.com",
            STRONG_PASSWORD,
            None,
        )
        .await;

        let response = make_request(
            app.clone(),
            Method::POST,
            "/forgot-password",
            "application/json",
            None,
            json!({"username": "nosuch", "email": "alice@example.com"})
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response_json(response).await["type"].as_str(),
            Some("unknown_user")
        );

        // Case-sensitive comparison against the stored address.
        let response = make_request(
            app.clone(),
            Method::POST,
            "/forgot-password",
            "application/json",
            None,
            json!({"username": "alice", "email": "Alice@example.com"})
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response_json(response).await["type"].as_str(),
            Some("email_mismatch")
        );

        // The credential stays untouched after rejections.
        let response = login(app, "alice", STRONG_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[sqlx::test]
    async fn test_reset_password(pool: Pool<Postgres>) {
        let app = app(router::state(pool));

        register(
            app.clone(),
            "alice",
            "alice@example.com",
            STRONG_PASSWORD,
            None,
        )
        .await;

        let response = make_request(
            app.clone(),
            Method::POST,
            "/reset-password",
            "application/json",
            None,
            json!({
                "old_username": "alice",
                "old_password": STRONG_PASSWORD,
                "new_password": "N3w@Secret",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response_json(response).await["message"].as_str(),
            Some("Password Updated Successfully.")
        );

        assert_eq!(
            login(app.clone(), "alice", "N3w@Secret").await.status(),
            StatusCode::OK
        );
        assert_eq!(
            login(app, "alice", STRONG_PASSWORD).await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[sqlx::test]
    async fn test_reset_password_rejections(pool: Pool<Postgres>) {
        let app = app(router::state(pool));

        register(
            app.clone(),
            "alice",
            "alice@example.com",
            STRONG_PASSWORD,
            None,
        )
        .await;

        let response = make_request(
            app.clone(),
            Method::POST,
            "/reset-password",
            "application/json",
            None,
            json!({
                "old_username": "alice",
                "old_password": "Wr0ng@Pass",
                "new_password": "N3w@Secret",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Weak replacement: soft failure, credential untouched.
        let response = make_request(
            app.clone(),
            Method::POST,
            "/reset-password",
            "application/json",
            None,
            json!({
                "old_username": "alice",
                "old_password": STRONG_PASSWORD,
                "new_password": "abcdefgh",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response_json(response).await["message"].as_str(),
            Some("Weak Password Entered!")
        );

        assert_eq!(
            login(app, "alice", STRONG_PASSWORD).await.status(),
            StatusCode::OK
        );
    }
}
