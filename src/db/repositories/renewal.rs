use std::collections::HashMap;

use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set,
};

use crate::entities::{renewal_requests, users};

pub struct RenewalRow {
    pub request: renewal_requests::Model,
    pub user_name: Option<String>,
}

pub struct RenewalRepository {
    conn: DatabaseConnection,
}

impl RenewalRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Whether the account already has an unresolved request.
    pub async fn has_pending(&self, user_id: i32) -> Result<bool> {
        let count = renewal_requests::Entity::find()
            .filter(renewal_requests::Column::UserId.eq(user_id))
            .filter(renewal_requests::Column::Status.eq("pending"))
            .count(&self.conn)
            .await
            .context("Failed to count pending renewal requests")?;
        Ok(count > 0)
    }

    pub async fn create(
        &self,
        user_id: i32,
        reason: Option<String>,
    ) -> Result<renewal_requests::Model> {
        let active = renewal_requests::ActiveModel {
            user_id: Set(user_id),
            reason: Set(reason),
            status: Set("pending".to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert renewal request")
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<renewal_requests::Model>> {
        renewal_requests::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query renewal request")
    }

    pub async fn set_status(&self, id: i32, status: &str) -> Result<()> {
        renewal_requests::Entity::update_many()
            .col_expr(
                renewal_requests::Column::Status,
                sea_orm::sea_query::Expr::value(status),
            )
            .filter(renewal_requests::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update renewal request status")?;
        Ok(())
    }

    /// Every request joined with the requester's name, pending first and
    /// newest first within each group.
    pub async fn list_with_names(&self) -> Result<Vec<RenewalRow>> {
        let mut requests = renewal_requests::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to query renewal requests")?;

        requests.sort_by(|a, b| {
            let a_pending = a.status == "pending";
            let b_pending = b.status == "pending";
            b_pending
                .cmp(&a_pending)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let user_ids: Vec<i32> = {
            let mut ids: Vec<i32> = requests.iter().map(|r| r.user_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };
        let names: HashMap<i32, String> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(user_ids))
                .select_only()
                .column(users::Column::Id)
                .column(users::Column::FullName)
                .into_tuple::<(i32, String)>()
                .all(&self.conn)
                .await
                .context("Failed to resolve requester names")?
                .into_iter()
                .collect()
        };

        Ok(requests
            .into_iter()
            .map(|request| {
                let user_name = names.get(&request.user_id).cloned();
                RenewalRow { request, user_name }
            })
            .collect())
    }
}
