//! Error handler for vouch.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Constraint backing `users.referral_code`. A violation on it is the only
/// retryable transactional failure (regenerate the code, retry the insert).
const REFERRAL_CODE_CONSTRAINT: &str = "users_referral_code_key";

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error("email already registered")]
    DuplicateEmail,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("unknown referral code")]
    InvalidReferralCode,

    #[error("referral code belongs to the account being created")]
    SelfReferral,

    #[error("no collision-free referral code found")]
    ExhaustedAllocationSpace,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no account matches the supplied username")]
    UnknownUser,

    #[error("email does not match the account on file")]
    EmailMismatch,

    #[error("token signing failed")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Time(#[from] std::time::SystemTimeError),

    #[error(transparent)]
    Credential(#[from] crate::credential::CredentialError),

    #[error("mail delivery failed")]
    Delivery(#[from] crate::mail::MailError),

    #[error("internal server error, {details}")]
    Internal { details: String },

    #[error("invalid 'Authorization' header")]
    Unauthorized,
}

impl ServerError {
    /// Whether this is a unique violation on `users.referral_code`. The
    /// storage constraint is the final arbiter of code uniqueness; the
    /// registration workflow retries the transaction with a fresh code when
    /// it fires.
    pub fn is_referral_code_collision(&self) -> bool {
        match self {
            ServerError::Sql(SQLxError::Database(err)) => {
                err.constraint() == Some(REFERRAL_CODE_CONSTRAINT)
            },
            _ => false,
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Set the stable machine-distinguishable reason in the `type` field.
    pub fn kind(mut self, kind: &str) -> Self {
        self.r#type = Some(kind.into());
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => {
                response.errors(validation_errors)
            },

            ServerError::DuplicateEmail => response
                .kind("duplicate_email")
                .title("Email already registered."),

            ServerError::DuplicateUsername => response
                .kind("duplicate_username")
                .title("Username already taken."),

            ServerError::InvalidReferralCode => response
                .kind("invalid_referral_code")
                .title("Invalid Referral Code."),

            ServerError::SelfReferral => response
                .kind("self_referral")
                .title("You cannot register with your own referral code."),

            ServerError::UnknownUser => {
                response.kind("unknown_user").title("User not found.")
            },

            ServerError::EmailMismatch => response
                .kind("email_mismatch")
                .title("Email does not match our records."),

            // One uniform reply for unknown user and wrong password.
            ServerError::InvalidCredentials => {
                response.title("Invalid credentials").details("")
            },

            ServerError::Unauthorized => response
                .title("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Delivery(err) => {
                tracing::error!(error = %err, "mail delivery failed");

                response
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .title("Error while changing password. Please Try Again!")
                    .details("")
            },

            ServerError::Axum(_) => response,

            // Store, token and allocation failures stay opaque to callers.
            _ => {
                tracing::error!(error = ?self, "server returned 500 status");

                ResponseError::default()
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
