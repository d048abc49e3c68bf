use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    /// Argon2id password hash
    pub password_hash: String,

    pub full_name: String,

    pub rank: Option<String>,

    pub position: Option<String>,

    pub division: Option<String>,

    pub subdivision: Option<String>,

    pub phone: Option<String>,

    pub email: Option<String>,

    /// One of `user`, `admin`, `super_admin`.
    pub role: String,

    /// Lifecycle status: `pending`, `active`, `rejected`, `locked`, `expired`.
    pub status: String,

    /// Consecutive failed logins since the last successful one.
    pub login_attempts: i32,

    /// Attempt-lockout deadline (RFC3339). Cleared on successful login.
    pub locked_until: Option<String>,

    /// Account validity end, `YYYY-MM-DD`. NULL means no expiry.
    pub expire_date: Option<String>,

    pub last_login: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
