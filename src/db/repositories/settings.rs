use anyhow::{Context, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::auth::policy::AuthPolicy;
use crate::entities::system_settings;

pub struct SettingsRepository {
    conn: DatabaseConnection,
}

impl SettingsRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = system_settings::Entity::find_by_id(key)
            .one(&self.conn)
            .await
            .context("Failed to query setting")?;
        Ok(row.map(|r| r.setting_value))
    }

    pub async fn all(&self) -> Result<Vec<system_settings::Model>> {
        system_settings::Entity::find()
            .order_by_asc(system_settings::Column::SettingKey)
            .all(&self.conn)
            .await
            .context("Failed to query settings")
    }

    pub async fn get_many(&self, keys: &[&str]) -> Result<Vec<system_settings::Model>> {
        system_settings::Entity::find()
            .filter(system_settings::Column::SettingKey.is_in(keys.iter().copied()))
            .all(&self.conn)
            .await
            .context("Failed to query settings subset")
    }

    /// Insert-or-update a single key, stamping who touched it.
    pub async fn upsert(&self, key: &str, value: &str, updated_by: Option<i32>) -> Result<()> {
        let active = system_settings::ActiveModel {
            setting_key: Set(key.to_string()),
            setting_value: Set(value.to_string()),
            updated_by: Set(updated_by),
            updated_at: Set(chrono::Utc::now().to_rfc3339()),
        };

        system_settings::Entity::insert(active)
            .on_conflict(
                OnConflict::column(system_settings::Column::SettingKey)
                    .update_columns([
                        system_settings::Column::SettingValue,
                        system_settings::Column::UpdatedBy,
                        system_settings::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await
            .context("Failed to upsert setting")?;
        Ok(())
    }

    /// Materialize the throttle/timeout policy snapshot. Absent or
    /// unparsable rows fall back to the baked-in defaults, so the login
    /// path keeps working on an empty table.
    pub async fn auth_policy(&self) -> Result<AuthPolicy> {
        let rows = self
            .get_many(&[
                "max_login_attempts",
                "lock_duration_minutes",
                "session_timeout_minutes",
                "warn_expire_days",
            ])
            .await?;

        let mut policy = AuthPolicy::default();
        for row in rows {
            let Ok(value) = row.setting_value.parse::<u32>() else {
                continue;
            };
            match row.setting_key.as_str() {
                "max_login_attempts" => policy.max_login_attempts = value,
                "lock_duration_minutes" => policy.lock_duration_minutes = value,
                "session_timeout_minutes" => policy.session_timeout_minutes = value,
                "warn_expire_days" => policy.warn_expire_days = value,
                _ => {}
            }
        }

        Ok(policy)
    }
}
