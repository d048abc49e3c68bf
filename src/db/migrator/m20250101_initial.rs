use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Seeded super admin password (operators are expected to rotate it).
const DEFAULT_ADMIN_PASSWORD: &str = "Admin@2025";

/// Hash the default password using Argon2id
fn hash_default_password() -> String {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(DEFAULT_ADMIN_PASSWORD.as_bytes(), &salt)
        .expect("Failed to hash default password")
        .to_string()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(UserSessions)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(ActivityLogs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SystemSettings)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(RenewalRequests)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Seed the super admin account
        let now = chrono::Utc::now().to_rfc3339();
        let password_hash = hash_default_password();

        let insert = sea_orm_migration::sea_query::Query::insert()
            .into_table(Users)
            .columns([
                crate::entities::users::Column::Username,
                crate::entities::users::Column::PasswordHash,
                crate::entities::users::Column::FullName,
                crate::entities::users::Column::Role,
                crate::entities::users::Column::Status,
                crate::entities::users::Column::LoginAttempts,
                crate::entities::users::Column::CreatedAt,
                crate::entities::users::Column::UpdatedAt,
            ])
            .values_panic([
                "admin".into(),
                password_hash.into(),
                "System Administrator".into(),
                "super_admin".into(),
                "active".into(),
                0.into(),
                now.clone().into(),
                now.clone().into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        // Seed throttle/timeout settings and branding keys
        let defaults: [(&str, &str); 6] = [
            ("max_login_attempts", "3"),
            ("lock_duration_minutes", "30"),
            ("session_timeout_minutes", "60"),
            ("warn_expire_days", "7"),
            ("system_name", "Forensic HR"),
            ("organization_name", "Office of Police Forensic Science"),
        ];

        let mut insert = sea_orm_migration::sea_query::Query::insert()
            .into_table(SystemSettings)
            .columns([
                crate::entities::system_settings::Column::SettingKey,
                crate::entities::system_settings::Column::SettingValue,
                crate::entities::system_settings::Column::UpdatedAt,
            ])
            .to_owned();

        for (key, value) in defaults {
            insert.values_panic([key.into(), value.into(), now.clone().into()]);
        }

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RenewalRequests).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SystemSettings).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ActivityLogs).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserSessions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
