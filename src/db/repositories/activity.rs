use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Serialize;

use crate::entities::{activity_logs, users};

/// One security-relevant event. `details` is an arbitrary JSON payload;
/// `actor` is None for anonymous events such as failed username lookups.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub actor: Option<i32>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<i32>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub action: Option<String>,
}

pub struct LogEntryRow {
    pub entry: activity_logs::Model,
    pub user_name: Option<String>,
}

pub struct LogPage {
    pub entries: Vec<LogEntryRow>,
    pub total_items: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub count: u64,
}

/// Device mix derived from recorded user agents. Events without an agent
/// string are not counted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceCounts {
    pub desktop: u64,
    pub mobile: u64,
    pub tablet: u64,
}

/// Aggregates for the admin dashboard charts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCharts {
    pub daily_logins: Vec<DailyCount>,
    pub divisions: Vec<NamedCount>,
    pub devices: DeviceCounts,
    pub hourly: Vec<HourlyCount>,
    pub pages: Vec<NamedCount>,
}

pub struct ActivityLogRepository {
    conn: DatabaseConnection,
}

impl ActivityLogRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, event: &AuditEvent) -> Result<()> {
        let details = if event.details.is_null() {
            None
        } else {
            Some(event.details.to_string())
        };

        let active = activity_logs::ActiveModel {
            user_id: Set(event.actor),
            action: Set(event.action.clone()),
            target_type: Set(event.target_type.clone()),
            target_id: Set(event.target_id),
            details: Set(details),
            ip_address: Set(event.ip_address.clone()),
            user_agent: Set(event.user_agent.clone()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        activity_logs::Entity::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to insert activity log entry")?;
        Ok(())
    }

    /// Paginated audit trail, newest first, joined with actor names. The
    /// free-text search matches either the actor's full name or the detail
    /// payload.
    pub async fn list(&self, filter: &LogFilter, page: u64, page_size: u64) -> Result<LogPage> {
        let mut query =
            activity_logs::Entity::find().order_by_desc(activity_logs::Column::CreatedAt);

        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let matching_users: Vec<i32> = users::Entity::find()
                .filter(users::Column::FullName.contains(search))
                .select_only()
                .column(users::Column::Id)
                .into_tuple()
                .all(&self.conn)
                .await
                .context("Failed to resolve log search to accounts")?;

            query = query.filter(
                Condition::any()
                    .add(activity_logs::Column::UserId.is_in(matching_users))
                    .add(activity_logs::Column::Details.contains(search)),
            );
        }
        if let Some(from) = filter.date_from.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(activity_logs::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.date_to.as_deref().filter(|s| !s.is_empty())
            && let Ok(day) = NaiveDate::parse_from_str(to, "%Y-%m-%d")
        {
            // Inclusive day bound: everything before the following midnight.
            let upper = (day + chrono::Duration::days(1))
                .format("%Y-%m-%d")
                .to_string();
            query = query.filter(activity_logs::Column::CreatedAt.lt(upper));
        }
        if let Some(action) = filter.action.as_deref().filter(|s| !s.is_empty()) {
            query = query.filter(activity_logs::Column::Action.eq(action));
        }

        let paginator = query.paginate(&self.conn, page_size.max(1));
        let totals = paginator.num_items_and_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        let actor_ids: Vec<i32> = items.iter().filter_map(|e| e.user_id).collect();
        let names: HashMap<i32, String> = if actor_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(actor_ids))
                .select_only()
                .column(users::Column::Id)
                .column(users::Column::FullName)
                .into_tuple::<(i32, String)>()
                .all(&self.conn)
                .await
                .context("Failed to resolve actor names")?
                .into_iter()
                .collect()
        };

        let entries = items
            .into_iter()
            .map(|entry| {
                let user_name = entry.user_id.and_then(|id| names.get(&id).cloned());
                LogEntryRow { entry, user_name }
            })
            .collect();

        Ok(LogPage {
            entries,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    /// Chart series over the trailing `days` window.
    pub async fn charts(&self, days: i64, today: NaiveDate) -> Result<ActivityCharts> {
        let cutoff = (today - chrono::Duration::days(days))
            .format("%Y-%m-%d")
            .to_string();

        // Daily successful logins
        let login_times: Vec<String> = activity_logs::Entity::find()
            .filter(activity_logs::Column::Action.eq("login"))
            .filter(activity_logs::Column::CreatedAt.gte(cutoff.clone()))
            .select_only()
            .column(activity_logs::Column::CreatedAt)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query login timestamps")?;

        let mut daily: BTreeMap<String, u64> = BTreeMap::new();
        for ts in &login_times {
            if ts.len() >= 10 {
                *daily.entry(ts[..10].to_string()).or_default() += 1;
            }
        }

        // All activity in the window, for the division, device and hourly
        // series
        let window: Vec<(Option<i32>, String, Option<String>)> = activity_logs::Entity::find()
            .filter(activity_logs::Column::CreatedAt.gte(cutoff.clone()))
            .select_only()
            .column(activity_logs::Column::UserId)
            .column(activity_logs::Column::CreatedAt)
            .column(activity_logs::Column::UserAgent)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query activity window")?;

        let actor_ids: Vec<i32> = {
            let mut ids: Vec<i32> = window.iter().filter_map(|(id, _, _)| *id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };
        let actor_divisions: HashMap<i32, String> = if actor_ids.is_empty() {
            HashMap::new()
        } else {
            users::Entity::find()
                .filter(users::Column::Id.is_in(actor_ids))
                .select_only()
                .column(users::Column::Id)
                .column(users::Column::Division)
                .into_tuple::<(i32, Option<String>)>()
                .all(&self.conn)
                .await
                .context("Failed to resolve actor divisions")?
                .into_iter()
                .filter_map(|(id, division)| division.filter(|d| !d.is_empty()).map(|d| (id, d)))
                .collect()
        };

        let mut division_counts: HashMap<String, u64> = HashMap::new();
        let mut hourly: BTreeMap<u32, u64> = BTreeMap::new();
        let mut devices = DeviceCounts::default();
        for (user_id, ts, agent) in &window {
            if let Some(id) = user_id
                && let Some(division) = actor_divisions.get(id)
            {
                *division_counts.entry(division.clone()).or_default() += 1;
            }
            if ts.len() >= 13
                && let Ok(hour) = ts[11..13].parse::<u32>()
            {
                *hourly.entry(hour).or_default() += 1;
            }
            if let Some(agent) = agent {
                match device_bucket(agent) {
                    Device::Desktop => devices.desktop += 1,
                    Device::Mobile => devices.mobile += 1,
                    Device::Tablet => devices.tablet += 1,
                }
            }
        }

        // Page views, grouped by the target they hit
        let view_targets: Vec<String> = activity_logs::Entity::find()
            .filter(activity_logs::Column::Action.eq("view"))
            .filter(activity_logs::Column::CreatedAt.gte(cutoff))
            .select_only()
            .column(activity_logs::Column::TargetType)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query page views")?;

        let mut page_counts: HashMap<String, u64> = HashMap::new();
        for target in view_targets {
            *page_counts.entry(target).or_default() += 1;
        }

        // Top five only, matching what the dashboard renders
        let mut divisions: Vec<NamedCount> = division_counts
            .into_iter()
            .map(|(name, count)| NamedCount { name, count })
            .collect();
        divisions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        divisions.truncate(5);

        let mut pages: Vec<NamedCount> = page_counts
            .into_iter()
            .map(|(name, count)| NamedCount { name, count })
            .collect();
        pages.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        pages.truncate(5);

        Ok(ActivityCharts {
            daily_logins: daily
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
            divisions,
            devices,
            hourly: hourly
                .into_iter()
                .map(|(hour, count)| HourlyCount { hour, count })
                .collect(),
            pages,
        })
    }
}

enum Device {
    Desktop,
    Mobile,
    Tablet,
}

/// Coarse user-agent classification. Android reports "Mobile" on phones but
/// not on tablets.
fn device_bucket(agent: &str) -> Device {
    let agent = agent.to_ascii_lowercase();
    if agent.contains("ipad")
        || agent.contains("tablet")
        || (agent.contains("android") && !agent.contains("mobi"))
    {
        Device::Tablet
    } else if agent.contains("mobi") || agent.contains("iphone") {
        Device::Mobile
    } else {
        Device::Desktop
    }
}
