//! PostgreSQL [`Store`] backend.
//!
//! Filters are compiled into SQL with [`QueryBuilder`], so every predicate
//! the filter types express maps to a bound parameter. Referential actions
//! live in the schema: deleting a tenant cascades to its users and work
//! items, deleting a user nulls out assignments.

use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{ErrorCode, HubError, Result};
use crate::store::models::{Tenant, User, WorkItemRow};
use crate::store::{
    NewTenant, NewUser, NewWorkItem, Store, TenantFilter, UserFilter, WorkItemFilter,
    WorkItemPatch,
};
use async_trait::async_trait;

const WORK_ITEM_COLUMNS: &str = "id, tenant_id, kind, title, description, status, priority, \
     assignee_id, created_by_id, meta, created_at, updated_at";

const WORK_ITEM_ORDER: &str = " ORDER BY CASE priority \
     WHEN 'URGENT' THEN 4 WHEN 'HIGH' THEN 3 WHEN 'MEDIUM' THEN 2 ELSE 1 END DESC, \
     created_at DESC";

/// Connection-pooled PostgreSQL store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool against the configured database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        info!(
            max_connections = config.max_connections,
            "database pool established"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                HubError::new(ErrorCode::StoreError, "schema migration failed").with_source(e)
            })?;
        info!("database migrations applied");
        Ok(())
    }
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant> {
    Ok(Tenant {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        tenant_id: row.try_get("tenant_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn work_item_from_row(row: &PgRow) -> Result<WorkItemRow> {
    Ok(WorkItemRow {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        kind: row.try_get::<String, _>("kind")?.parse()?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        priority: row.try_get::<String, _>("priority")?.parse()?,
        assignee_id: row.try_get("assignee_id")?,
        created_by_id: row.try_get("created_by_id")?,
        meta: row.try_get("meta")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_tenant_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &TenantFilter) {
    let mut sep = " WHERE ";
    if let Some(id) = filter.id {
        qb.push(sep).push("id = ").push_bind(id);
        sep = " AND ";
    }
    if let Some(slug) = &filter.slug {
        qb.push(sep).push("slug = ").push_bind(slug.clone());
    }
}

fn push_user_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    let mut sep = " WHERE ";
    if let Some(tenant_id) = filter.tenant_id {
        qb.push(sep).push("tenant_id = ").push_bind(tenant_id);
        sep = " AND ";
    }
    if let Some(id) = filter.id {
        qb.push(sep).push("id = ").push_bind(id);
        sep = " AND ";
    }
    if let Some(ids) = &filter.ids {
        let raw: Vec<uuid::Uuid> = ids.iter().map(|u| u.0).collect();
        qb.push(sep).push("id = ANY(").push_bind(raw).push(")");
        sep = " AND ";
    }
    if let Some(email) = &filter.email {
        qb.push(sep).push("email = ").push_bind(email.clone());
        sep = " AND ";
    }
    if let Some(role) = filter.role {
        qb.push(sep).push("role = ").push_bind(role.as_str());
    }
}

fn push_work_item_where(qb: &mut QueryBuilder<'_, Postgres>, filter: &WorkItemFilter) {
    let mut sep = " WHERE ";
    if let Some(tenant_id) = filter.tenant_id {
        qb.push(sep).push("tenant_id = ").push_bind(tenant_id);
        sep = " AND ";
    }
    if let Some(id) = filter.id {
        qb.push(sep).push("id = ").push_bind(id);
        sep = " AND ";
    }
    if let Some(kind) = filter.kind {
        qb.push(sep).push("kind = ").push_bind(kind.as_str());
        sep = " AND ";
    }
    if let Some(status) = filter.status {
        qb.push(sep).push("status = ").push_bind(status.as_str());
        sep = " AND ";
    }
    if let Some(priority) = filter.priority {
        qb.push(sep).push("priority = ").push_bind(priority.as_str());
        sep = " AND ";
    }
    if let Some(assignee_id) = filter.assignee_id {
        qb.push(sep).push("assignee_id = ").push_bind(assignee_id);
        sep = " AND ";
    }
    if let Some(created_by_id) = filter.created_by_id {
        qb.push(sep).push("created_by_id = ").push_bind(created_by_id);
        sep = " AND ";
    }
    if let Some(user) = filter.involves_user {
        qb.push(sep)
            .push("(assignee_id = ")
            .push_bind(user)
            .push(" OR created_by_id = ")
            .push_bind(user)
            .push(")");
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_tenant(&self, filter: &TenantFilter) -> Result<Option<Tenant>> {
        let mut qb = QueryBuilder::new(
            "SELECT id, name, slug, created_at, updated_at FROM tenants",
        );
        push_tenant_where(&mut qb, filter);
        qb.push(" LIMIT 1");
        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn create_tenant(&self, new: NewTenant) -> Result<Tenant> {
        let row = sqlx::query(
            "INSERT INTO tenants (id, name, slug) VALUES (gen_random_uuid(), $1, $2) \
             RETURNING id, name, slug, created_at, updated_at",
        )
        .bind(&new.name)
        .bind(&new.slug)
        .fetch_one(&self.pool)
        .await?;
        tenant_from_row(&row)
    }

    async fn delete_tenants(&self, filter: &TenantFilter) -> Result<u64> {
        let mut qb = QueryBuilder::new("DELETE FROM tenants");
        push_tenant_where(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn find_user(&self, filter: &UserFilter) -> Result<Option<User>> {
        let mut qb = QueryBuilder::new(
            "SELECT id, email, name, role, tenant_id, created_at, updated_at FROM users",
        );
        push_user_where(&mut qb, filter);
        qb.push(" LIMIT 1");
        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let mut qb = QueryBuilder::new(
            "SELECT id, email, name, role, tenant_id, created_at, updated_at FROM users",
        );
        push_user_where(&mut qb, filter);
        qb.push(" ORDER BY created_at");
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let tenant_id = new.tenant_id.ok_or_else(|| {
            HubError::new(
                ErrorCode::MissingRequiredField,
                "tenant_id is required for this record",
            )
        })?;
        let row = sqlx::query(
            "INSERT INTO users (id, email, name, role, tenant_id) \
             VALUES (gen_random_uuid(), $1, $2, $3, $4) \
             RETURNING id, email, name, role, tenant_id, created_at, updated_at",
        )
        .bind(&new.email)
        .bind(&new.name)
        .bind(new.role.as_str())
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        user_from_row(&row)
    }

    async fn find_work_item(&self, filter: &WorkItemFilter) -> Result<Option<WorkItemRow>> {
        let mut qb =
            QueryBuilder::new(format!("SELECT {WORK_ITEM_COLUMNS} FROM work_items"));
        push_work_item_where(&mut qb, filter);
        qb.push(" LIMIT 1");
        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(work_item_from_row).transpose()
    }

    async fn find_work_items(&self, filter: &WorkItemFilter) -> Result<Vec<WorkItemRow>> {
        let mut qb =
            QueryBuilder::new(format!("SELECT {WORK_ITEM_COLUMNS} FROM work_items"));
        push_work_item_where(&mut qb, filter);
        qb.push(WORK_ITEM_ORDER);
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(work_item_from_row).collect()
    }

    async fn create_work_item(&self, new: NewWorkItem) -> Result<WorkItemRow> {
        let tenant_id = new.tenant_id.ok_or_else(|| {
            HubError::new(
                ErrorCode::MissingRequiredField,
                "tenant_id is required for this record",
            )
        })?;
        let row = sqlx::query(&format!(
            "INSERT INTO work_items \
             (id, tenant_id, kind, title, description, status, priority, \
              assignee_id, created_by_id, meta) \
             VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {WORK_ITEM_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.status.as_str())
        .bind(new.priority.as_str())
        .bind(new.assignee_id)
        .bind(new.created_by_id)
        .bind(&new.meta)
        .fetch_one(&self.pool)
        .await?;
        work_item_from_row(&row)
    }

    async fn update_work_items(
        &self,
        filter: &WorkItemFilter,
        patch: WorkItemPatch,
    ) -> Result<u64> {
        // A field-free patch still touches `updated_at`, matching the memory
        // backend, so callers can distinguish "row exists" from "row gone".
        let mut qb = QueryBuilder::new("UPDATE work_items SET updated_at = now()");
        if let Some(title) = &patch.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(status) = patch.status {
            qb.push(", status = ").push_bind(status.as_str());
        }
        if let Some(priority) = patch.priority {
            qb.push(", priority = ").push_bind(priority.as_str());
        }
        if let Some(assignee_id) = patch.assignee_id {
            qb.push(", assignee_id = ").push_bind(assignee_id);
        }
        if let Some(meta) = &patch.meta {
            qb.push(", meta = ").push_bind(meta.clone());
        }
        push_work_item_where(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_work_items(&self, filter: &WorkItemFilter) -> Result<u64> {
        let mut qb = QueryBuilder::new("DELETE FROM work_items");
        push_work_item_where(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
