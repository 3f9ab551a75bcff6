//! Credential login issuing session tokens.

use axum::extract::{Form, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::user::UserRepository;

pub const TOKEN_TYPE: &str = "bearer";

#[derive(Debug, Serialize, Deserialize)]
pub struct Body {
    pub username: String,
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub access_token: String,
    pub token_type: String,
}

/// Handler to authenticate credentials and mint a session token.
///
/// Unknown user and wrong password answer the same way.
pub async fn handler(
    State(state): State<AppState>,
    Form(body): Form<Body>,
) -> Result<Json<Response>> {
    let user = UserRepository::new(state.db.postgres.clone())
        .find_by_username(&body.username)
        .await?
        .filter(|user| {
            state
                .crypto
                .verify_password(&body.password, &user.password_hash)
        })
        .ok_or(ServerError::InvalidCredentials)?;

    let access_token = state.token.create(&user.username)?;

    tracing::debug!(username = %user.username, "session opened");

    Ok(Json(Response {
        access_token,
        token_type: TOKEN_TYPE.to_owned(),
    }))
}

#[cfg(test)]
pub(super) mod tests {
    use axum::Router;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use sqlx::{Pool, Postgres};

    use super::*;
    use crate::router::register::tests::{STRONG_PASSWORD, register};
    use crate::{app, make_request, router};

    /// POST /login helper reused across router tests.
    pub(crate) async fn login(
        app: Router,
        username: &str,
        password: &str,
    ) -> axum::http::Response<axum::body::Body> {
        make_request(
            app,
            Method::POST,
            "/login",
            "application/x-www-form-urlencoded",
            None,
            format!("username={username}&password={password}"),
        )
        .await
    }

    #[sqlx::test]
    async fn test_login(pool: Pool<Postgres>) {
        let state = router::state(pool);
        let app = app(state.clone());

        register(
            app.clone(),
            "alice",
            "alice@example.com",
            STRONG_PASSWORD,
            None,
        )
        .await;

        let response = login(app, "alice", STRONG_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.token_type, TOKEN_TYPE);

        let claims = state.token.decode(&body.access_token).unwrap();
        assert_eq!(claims.sub, "alice");
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert!(claims.exp > now);
    }

    #[sqlx::test]
    async fn test_login_is_uniform_on_failure(pool: Pool<Postgres>) {
        let app = app(router::state(pool));

        register(
            app.clone(),
            "alice",
            "alice@example.com",
            STRONG_PASSWORD,
            None,
        )
        .await;

        let wrong_password = login(app.clone(), "alice", "Wr0ng@Pass").await;
        let unknown_user = login(app, "nosuch", STRONG_PASSWORD).await;

        assert_eq!(wrong_password.status(), StatusCode::BAD_REQUEST);
        assert_eq!(unknown_user.status(), StatusCode::BAD_REQUEST);

        // No distinguishing detail between the two failure causes.
        let one = wrong_password
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes();
        let two = unknown_user.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(one, two);
    }
}
