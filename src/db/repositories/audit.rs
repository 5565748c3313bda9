use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::entities::{audit_logs, prelude::*, users};

/// Filters for the admin audit view
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub page: u64,
    pub per_page: u64,
    pub user_id: Option<i32>,
    pub action_contains: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append one entry. Timestamps are written RFC 3339 so the string
    /// comparisons in the date filters stay chronological.
    pub async fn add(
        &self,
        action: &str,
        user_id: Option<i32>,
        ip: Option<String>,
        executed_command: Option<String>,
    ) -> Result<()> {
        let active = audit_logs::ActiveModel {
            action: Set(action.to_string()),
            user_id: Set(user_id),
            ip: Set(ip),
            executed_command: Set(executed_command),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        AuditLogs::insert(active).exec(&self.conn).await?;
        Ok(())
    }

    /// One user's entries, newest first.
    pub async fn for_user(
        &self,
        user_id: i32,
        errors_only: bool,
        start_date: Option<String>,
        end_date: Option<String>,
        limit: u64,
    ) -> Result<Vec<audit_logs::Model>> {
        let mut query = AuditLogs::find()
            .filter(audit_logs::Column::UserId.eq(user_id))
            .order_by_desc(audit_logs::Column::CreatedAt);

        if errors_only {
            query = query.filter(audit_logs::Column::Action.contains("_FAILED"));
        }

        if let Some(start) = start_date {
            query = query.filter(audit_logs::Column::CreatedAt.gte(start));
        }

        if let Some(end) = end_date {
            query = query.filter(audit_logs::Column::CreatedAt.lte(end));
        }

        let items = query.limit(limit).all(&self.conn).await?;
        Ok(items)
    }

    /// Admin view: filtered pages joined with the acting user when known.
    /// Returns the page plus the unfiltered-by-page total.
    pub async fn admin_query(
        &self,
        q: &AuditQuery,
    ) -> Result<(Vec<(audit_logs::Model, Option<users::Model>)>, u64)> {
        let mut query = AuditLogs::find()
            .find_also_related(Users)
            .order_by_desc(audit_logs::Column::CreatedAt);

        if let Some(user_id) = q.user_id {
            query = query.filter(audit_logs::Column::UserId.eq(user_id));
        }

        if let Some(action) = &q.action_contains {
            query = query.filter(audit_logs::Column::Action.contains(action));
        }

        if let Some(start) = &q.start_date {
            query = query.filter(audit_logs::Column::CreatedAt.gte(start.clone()));
        }

        if let Some(end) = &q.end_date {
            query = query.filter(audit_logs::Column::CreatedAt.lte(end.clone()));
        }

        let paginator = query.paginate(&self.conn, q.per_page);
        let total = paginator.num_items().await?;
        let page = q.page.max(1);
        let items = paginator.fetch_page(page - 1).await?;

        Ok((items, total))
    }

    /// Most frequent actions
    pub async fn top_actions(&self, limit: u64) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = AuditLogs::find()
            .select_only()
            .column(audit_logs::Column::Action)
            .column_as(audit_logs::Column::Id.count(), "count")
            .group_by(audit_logs::Column::Action)
            .order_by(audit_logs::Column::Id.count(), Order::Desc)
            .limit(limit)
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(rows)
    }

    /// Most active known users: (user_id, events)
    pub async fn top_users(&self, limit: u64) -> Result<Vec<(i32, i64)>> {
        let rows: Vec<(i32, i64)> = AuditLogs::find()
            .select_only()
            .column(audit_logs::Column::UserId)
            .column_as(audit_logs::Column::Id.count(), "count")
            .filter(audit_logs::Column::UserId.is_not_null())
            .group_by(audit_logs::Column::UserId)
            .order_by(audit_logs::Column::Id.count(), Order::Desc)
            .limit(limit)
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(rows)
    }

    /// Count of `_FAILED` actions since the RFC 3339 cutoff
    pub async fn failures_since(&self, cutoff: &str) -> Result<u64> {
        let count = AuditLogs::find()
            .filter(audit_logs::Column::Action.contains("_FAILED"))
            .filter(audit_logs::Column::CreatedAt.gte(cutoff))
            .count(&self.conn)
            .await?;

        Ok(count)
    }
}
