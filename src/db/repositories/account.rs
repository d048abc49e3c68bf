use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::NaiveDate;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::auth::status::Role;
use crate::config::SecurityConfig;
use crate::entities::users;

/// Fields for a new account row. Password arrives pre-hashed; the plaintext
/// never reaches this layer.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub rank: Option<String>,
    pub position: Option<String>,
    pub division: Option<String>,
    pub subdivision: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub status: String,
    pub expire_date: Option<String>,
}

/// Listing filters for the admin user table.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub search: Option<String>,
    pub division: Option<String>,
    pub status: Option<String>,
}

pub struct AccountPage {
    pub accounts: Vec<users::Model>,
    pub total_items: u64,
    pub total_pages: u64,
}

/// Stored-status rollup for the admin dashboard. `expiring` counts accounts
/// whose expiry falls within the next seven days but has not yet passed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountStats {
    pub total: u64,
    pub active: u64,
    pub pending: u64,
    pub locked: u64,
    pub expired: u64,
    pub expiring: u64,
}

const EXPIRING_WINDOW_DAYS: i64 = 7;

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get account by username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query account by username")
    }

    /// Get account by ID
    pub async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query account by ID")
    }

    /// Insert a new account row. The unique constraint on `username` is the
    /// final arbiter of duplicates; callers inspect the error for it.
    pub async fn create(&self, new: NewAccount) -> Result<users::Model> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(new.username),
            password_hash: Set(new.password_hash),
            full_name: Set(new.full_name),
            rank: Set(new.rank),
            position: Set(new.position),
            division: Set(new.division),
            subdivision: Set(new.subdivision),
            phone: Set(new.phone),
            email: Set(new.email),
            role: Set(new.role),
            status: Set(new.status),
            login_attempts: Set(0),
            expire_date: Set(new.expire_date),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert account")
    }

    /// Atomically bump the failed-login counter and, once it reaches
    /// `max_attempts`, stamp `locked_until`. Returns the new counter value
    /// and whether the lock was applied. Runs in a transaction so two
    /// concurrent failures cannot under-count.
    pub async fn register_failed_attempt(
        &self,
        id: i32,
        max_attempts: i32,
        lock_until: &str,
    ) -> Result<(i32, bool)> {
        let now = chrono::Utc::now().to_rfc3339();
        let txn = self.conn.begin().await?;

        users::Entity::update_many()
            .col_expr(
                users::Column::LoginAttempts,
                Expr::col(users::Column::LoginAttempts).add(1),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now.clone()))
            .filter(users::Column::Id.eq(id))
            .exec(&txn)
            .await
            .context("Failed to increment login attempts")?;

        let attempts: Option<i32> = users::Entity::find_by_id(id)
            .select_only()
            .column(users::Column::LoginAttempts)
            .into_tuple()
            .one(&txn)
            .await
            .context("Failed to re-read login attempts")?;
        let attempts = attempts.unwrap_or(0);

        let locked = attempts >= max_attempts;
        if locked {
            users::Entity::update_many()
                .col_expr(users::Column::LockedUntil, Expr::value(Some(lock_until)))
                .col_expr(users::Column::UpdatedAt, Expr::value(now))
                .filter(users::Column::Id.eq(id))
                .exec(&txn)
                .await
                .context("Failed to stamp lockout deadline")?;
        }

        txn.commit().await?;
        Ok((attempts, locked))
    }

    /// Successful-login bookkeeping: zero the counter, clear any time lock,
    /// stamp `last_login`.
    pub async fn mark_logged_in(&self, id: i32) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::LoginAttempts, Expr::value(0))
            .col_expr(users::Column::LockedUntil, Expr::value(Option::<String>::None))
            .col_expr(users::Column::LastLogin, Expr::value(Some(now.clone())))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to record successful login")?;

        Ok(())
    }

    pub async fn set_status(&self, id: i32, status: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value(status))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update account status")?;

        Ok(())
    }

    pub async fn set_expire_date(&self, id: i32, expire_date: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::ExpireDate, Expr::value(expire_date))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update expire date")?;

        Ok(())
    }

    /// Approve in one write: activate and stamp the expiry.
    pub async fn approve(&self, id: i32, expire_date: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value("active"))
            .col_expr(users::Column::ExpireDate, Expr::value(Some(expire_date)))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to approve account")?;

        Ok(())
    }

    /// Admin unlock: reactivate and wipe the throttle state in one write.
    pub async fn unlock(&self, id: i32) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value("active"))
            .col_expr(users::Column::LoginAttempts, Expr::value(0))
            .col_expr(users::Column::LockedUntil, Expr::value(Option::<String>::None))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to unlock account")?;

        Ok(())
    }

    pub async fn update_password(&self, id: i32, password_hash: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update password hash")?;

        Ok(())
    }

    /// Paginated listing for the admin user table. Super admins never appear.
    pub async fn search(
        &self,
        filter: &AccountFilter,
        page: u64,
        page_size: u64,
    ) -> Result<AccountPage> {
        let mut query = users::Entity::find()
            .filter(users::Column::Role.ne(Role::SuperAdmin.as_str()))
            .order_by_desc(users::Column::CreatedAt);

        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(users::Column::FullName.contains(search))
                    .add(users::Column::Position.contains(search))
                    .add(users::Column::Username.contains(search)),
            );
        }
        if let Some(division) = filter.division.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(users::Column::Division.eq(division));
        }
        if let Some(status) = filter.status.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(users::Column::Status.eq(status));
        }

        let paginator = query.paginate(&self.conn, page_size.max(1));
        let totals = paginator.num_items_and_pages().await?;
        let accounts = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(AccountPage {
            accounts,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    /// Dashboard rollup over stored statuses, excluding super admins.
    pub async fn stats(&self, today: NaiveDate) -> Result<AccountStats> {
        let rows: Vec<(String, Option<String>)> = users::Entity::find()
            .filter(users::Column::Role.ne(Role::SuperAdmin.as_str()))
            .select_only()
            .column(users::Column::Status)
            .column(users::Column::ExpireDate)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query account status rollup")?;

        let mut stats = AccountStats::default();
        for (status, expire_date) in rows {
            stats.total += 1;
            match status.as_str() {
                "active" => stats.active += 1,
                "pending" => stats.pending += 1,
                "locked" => stats.locked += 1,
                "expired" => stats.expired += 1,
                _ => {}
            }
            if let Some(date) = expire_date.as_deref()
                && let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                && date > today
                && date <= today + chrono::Duration::days(EXPIRING_WINDOW_DAYS)
            {
                stats.expiring += 1;
            }
        }

        Ok(stats)
    }

    /// Distinct non-empty division names, sorted.
    pub async fn divisions(&self) -> Result<Vec<String>> {
        let rows: Vec<Option<String>> = users::Entity::find()
            .filter(users::Column::Division.is_not_null())
            .select_only()
            .column(users::Column::Division)
            .distinct()
            .order_by_asc(users::Column::Division)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query divisions")?;

        Ok(rows.into_iter().flatten().filter(|d| !d.is_empty()).collect())
    }

    /// Physical delete of a single account. Role checks happen upstream.
    pub async fn delete(&self, id: i32) -> Result<u64> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete account")?;
        Ok(result.rows_affected)
    }

    /// Bulk status write over an id list. Super admin rows are filtered out
    /// even if a caller smuggles their id in.
    pub async fn bulk_set_status(&self, ids: &[i32], status: &str) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value(status))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.is_in(ids.to_vec()))
            .filter(users::Column::Role.ne(Role::SuperAdmin.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to bulk-update account status")?;

        Ok(result.rows_affected)
    }

    /// Bulk unlock: clears throttle state as well as the status.
    pub async fn bulk_unlock(&self, ids: &[i32]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value("active"))
            .col_expr(users::Column::LoginAttempts, Expr::value(0))
            .col_expr(users::Column::LockedUntil, Expr::value(Option::<String>::None))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.is_in(ids.to_vec()))
            .filter(users::Column::Role.ne(Role::SuperAdmin.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to bulk-unlock accounts")?;

        Ok(result.rows_affected)
    }

    pub async fn bulk_approve(&self, ids: &[i32], expire_date: &str) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value("active"))
            .col_expr(users::Column::ExpireDate, Expr::value(Some(expire_date)))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.is_in(ids.to_vec()))
            .filter(users::Column::Role.ne(Role::SuperAdmin.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to bulk-approve accounts")?;

        Ok(result.rows_affected)
    }

    pub async fn bulk_delete(&self, ids: &[i32]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = users::Entity::delete_many()
            .filter(users::Column::Id.is_in(ids.to_vec()))
            .filter(users::Column::Role.ne(Role::SuperAdmin.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to bulk-delete accounts")?;

        Ok(result.rows_affected)
    }

    /// Push each account's expiry `days` forward from whichever is later,
    /// its current expiry or today. Accounts without an expiry start from
    /// today.
    pub async fn extend_expiry(&self, ids: &[i32], days: i64, today: NaiveDate) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let targets = users::Entity::find()
            .filter(users::Column::Id.is_in(ids.to_vec()))
            .filter(users::Column::Role.ne(Role::SuperAdmin.as_str()))
            .all(&self.conn)
            .await
            .context("Failed to load accounts for expiry extension")?;

        let now = chrono::Utc::now().to_rfc3339();
        let txn = self.conn.begin().await?;
        let mut updated = 0u64;

        for account in targets {
            let base = account
                .expire_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .map_or(today, |d| d.max(today));
            let new_date = (base + chrono::Duration::days(days))
                .format("%Y-%m-%d")
                .to_string();

            users::Entity::update_many()
                .col_expr(users::Column::ExpireDate, Expr::value(Some(new_date)))
                .col_expr(users::Column::UpdatedAt, Expr::value(now.clone()))
                .filter(users::Column::Id.eq(account.id))
                .exec(&txn)
                .await
                .context("Failed to extend account expiry")?;
            updated += 1;
        }

        txn.commit().await?;
        Ok(updated)
    }

    /// Approve every pending account with the given expiry. Returns the count.
    pub async fn approve_all_pending(&self, expire_date: &str) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::Status, Expr::value("active"))
            .col_expr(users::Column::ExpireDate, Expr::value(Some(expire_date)))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Status.eq("pending"))
            .filter(users::Column::Role.ne(Role::SuperAdmin.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to approve pending accounts")?;

        Ok(result.rows_affected)
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Constant-shape verification against a stored Argon2 hash.
pub fn verify_password_hash(stored_hash: &str, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
