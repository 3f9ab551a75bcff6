//! Handle database requests.

use rust_decimal::Decimal;
use sqlx::{Pool, Postgres};

use crate::error::Result;
use crate::user::{
    NewAccount, ReferralAward, ReferralEntry, ReferralStats, ReferralStatus,
    RewardStatus, User,
};

#[derive(Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Find a user by `username`.
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>> {
        self.find_by_field(Field::Username, username).await
    }

    /// Find a user by `email`.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by_field(Field::Email, email).await
    }

    /// Find a user by `referral_code`.
    pub async fn find_by_referral_code(
        &self,
        code: &str,
    ) -> Result<Option<User>> {
        self.find_by_field(Field::ReferralCode, code).await
    }

    async fn find_by_field(
        &self,
        field: Field,
        value: &str,
    ) -> Result<Option<User>> {
        let query = get_by_field_query(field);

        let user = sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Whether a referral code is already persisted.
    ///
    /// Advisory only; insertion still races against concurrent allocations
    /// and relies on the unique constraint.
    pub async fn code_exists(&self, code: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE referral_code = $1)"#,
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a new user and, when a referrer was resolved, the referral
    /// edge and its pending reward, in one transaction.
    ///
    /// The user insert is ordered before the referral and reward inserts;
    /// all three become visible together at commit or not at all.
    pub async fn insert(
        &self,
        account: &NewAccount<'_>,
        award: Option<&ReferralAward<'_>>,
    ) -> Result<i32> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i32>(
            r#"INSERT INTO users (username, email, password_hash, referral_code, referred_by)
                VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(account.username)
        .bind(account.email)
        .bind(account.password_hash)
        .bind(account.referral_code)
        .bind(account.referred_by)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(award) = award {
            sqlx::query(
                r#"INSERT INTO referrals (referrer_id, referred_user_id, status)
                    VALUES ($1, $2, $3)"#,
            )
            .bind(award.referrer_id)
            .bind(id)
            .bind(ReferralStatus::Successful.as_str())
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"INSERT INTO rewards (user_id, reward_type, reward_amount, reward_status)
                    VALUES ($1, $2, $3, $4)"#,
            )
            .bind(award.referrer_id)
            .bind(award.reward_type)
            .bind(award.reward_amount)
            .bind(RewardStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(id)
    }

    /// Replace the password credential of a user.
    pub async fn set_password(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE users SET password_hash = $1 WHERE username = $2"#,
        )
        .bind(password_hash)
        .bind(username)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All accounts referred by `referrer_id`, most recent first.
    pub async fn referrals_of(
        &self,
        referrer_id: i32,
    ) -> Result<Vec<ReferralEntry>> {
        let referrals = sqlx::query_as::<_, ReferralEntry>(
            r#"SELECT u.username, u.email, r.date_referred, r.status
                FROM users u
                JOIN referrals r ON u.id = r.referred_user_id
                WHERE r.referrer_id = $1
                ORDER BY r.date_referred DESC"#,
        )
        .bind(referrer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals)
    }

    /// Referral counters for one user: successful referrals and claimed
    /// reward total.
    pub async fn stats_of(&self, user_id: i32) -> Result<ReferralStats> {
        let successful_referrals = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM referrals
                WHERE referrer_id = $1 AND status = $2"#,
        )
        .bind(user_id)
        .bind(ReferralStatus::Successful.as_str())
        .fetch_one(&self.pool)
        .await?;

        let total_rewards = sqlx::query_scalar::<_, Decimal>(
            r#"SELECT COALESCE(SUM(reward_amount), 0) FROM rewards
                WHERE user_id = $1 AND reward_status = $2"#,
        )
        .bind(user_id)
        .bind(RewardStatus::Claimed.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(ReferralStats {
            successful_referrals,
            total_rewards,
        })
    }
}

#[derive(Debug, Clone)]
enum Field {
    Username,
    Email,
    ReferralCode,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Username => write!(f, "username"),
            Field::Email => write!(f, "email"),
            Field::ReferralCode => write!(f, "referral_code"),
        }
    }
}

fn get_by_field_query(field: Field) -> String {
    format!(
        r#"SELECT
                id,
                username,
                email,
                password_hash,
                referral_code,
                referred_by,
                created_at
            FROM users
            WHERE {field} = $1"#
    )
}
