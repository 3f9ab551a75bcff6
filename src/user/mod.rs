mod repository;

pub use repository::*;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// User as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    /// Unique 8-character code identifying this user as a referrer.
    pub referral_code: String,
    /// Code of the referrer, when this account was referred.
    pub referred_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Minimal projection attached to authenticated requests.
#[derive(Clone, Debug, Serialize)]
pub struct Identity {
    #[serde(skip)]
    pub id: i32,
    pub username: String,
    pub email: String,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Lifecycle of a referral edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferralStatus {
    Pending,
    Successful,
    Failed,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Successful => "successful",
            Self::Failed => "failed",
        }
    }
}

/// Lifecycle of a referral reward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardStatus {
    Pending,
    Claimed,
    Expired,
}

impl RewardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::Expired => "expired",
        }
    }
}

/// Row returned when listing the accounts a user referred.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReferralEntry {
    pub username: String,
    pub email: String,
    pub date_referred: DateTime<Utc>,
    pub status: String,
}

/// Aggregated referral counters for one referrer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferralStats {
    pub successful_referrals: i64,
    pub total_rewards: Decimal,
}

/// Field values for a user row not yet persisted.
#[derive(Debug)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub referral_code: &'a str,
    pub referred_by: Option<&'a str>,
}

/// Referral edge and pending reward written alongside a new account.
#[derive(Debug)]
pub struct ReferralAward<'a> {
    pub referrer_id: i32,
    pub reward_type: &'a str,
    pub reward_amount: Decimal,
}
