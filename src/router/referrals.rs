//! Authenticated referral listing and statistics.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::AppState;
use crate::error::Result;
use crate::router::Notice;
use crate::user::{Identity, ReferralEntry, ReferralStats, UserRepository};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ListResponse {
    Found { referrals: Vec<ReferralEntry> },
    Empty(Notice),
}

/// Accounts referred by the logged-in user.
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ListResponse>> {
    let referrals = UserRepository::new(state.db.postgres.clone())
        .referrals_of(identity.id)
        .await?;

    if referrals.is_empty() {
        return Ok(Json(ListResponse::Empty(Notice::new(
            "No referrals found",
        ))));
    }

    Ok(Json(ListResponse::Found { referrals }))
}

/// Referral statistics for the logged-in user.
pub async fn stats(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ReferralStats>> {
    let stats = UserRepository::new(state.db.postgres.clone())
        .stats_of(identity.id)
        .await?;

    Ok(Json(stats))
}
