//! Work-item operations.
//!
//! [`WorkItemService`] binds an [`Actor`] to a tenant-scoped client and
//! exposes the seven operations callers use. Every operation authorizes
//! before touching the store, goes through [`TenantClient`] so tenant
//! isolation cannot be skipped, and returns a [`Timed`] result whose
//! duration also feeds the action-latency histogram.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::error::{ErrorCode, HubError, Result};
use crate::permissions::{authorize, role_allows, Action, UserId};
use crate::store::models::{UserSummary, WorkItemRow};
use crate::store::{
    QueryOptions, Store, TenantClient, UserFilter, WorkItemFilter, WorkItemPatch,
};
use crate::telemetry::metrics::record_action_duration;
use crate::workitems::types::{
    Actor, CreateWorkItem, KanbanBoard, Timed, UpdateWorkItem, WorkItem, WorkItemFilters,
    WorkItemId, WorkItemPriority, WorkItemStatus,
};

const TITLE_MAX_CHARS: usize = 500;

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(HubError::new(
            ErrorCode::MissingRequiredField,
            "title must not be empty",
        ));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(HubError::validation(format!(
            "title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Timing
// ─────────────────────────────────────────────────────────────────────────────

struct ActionTimer {
    action: &'static str,
    start: Instant,
}

impl ActionTimer {
    fn start(action: &'static str) -> Self {
        Self {
            action,
            start: Instant::now(),
        }
    }

    fn finish<T>(self, value: T) -> Timed<T> {
        Timed::new(value, self.start.elapsed())
    }
}

// The histogram is recorded on drop so error paths are measured too.
impl Drop for ActionTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        record_action_duration(self.action, elapsed);
        debug!(
            action = self.action,
            elapsed_ms = elapsed.as_millis() as u64,
            "action finished"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Work-item operations for one authenticated actor.
pub struct WorkItemService {
    client: TenantClient,
    actor: Actor,
}

impl WorkItemService {
    /// Build a service whose store access is confined to the actor's tenant.
    pub fn new(store: Arc<dyn Store>, actor: Actor) -> Self {
        Self {
            client: TenantClient::scoped(store, actor.tenant_id),
            actor,
        }
    }

    /// Build a service over an existing client. The client's scope is taken
    /// as-is; callers handing in an unscoped client own that decision.
    pub fn with_client(client: TenantClient, actor: Actor) -> Self {
        Self { client, actor }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Whether this actor only sees work items they are involved in.
    fn restricted(&self) -> bool {
        !role_allows(self.actor.role, Action::ReadAllTickets)
    }

    fn involves(&self, row: &WorkItemRow) -> bool {
        row.assignee_id == Some(self.actor.user_id) || row.created_by_id == self.actor.user_id
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a work item owned by the actor. Status defaults to TODO and
    /// priority to MEDIUM when absent.
    #[instrument(skip(self, input), fields(user_id = %self.actor.user_id, role = %self.actor.role))]
    pub async fn create(&self, input: CreateWorkItem) -> Result<Timed<WorkItem>> {
        let timer = ActionTimer::start("create");
        authorize(&self.actor.permission_context(), Action::CreateTicket)?;

        validate_title(&input.title)?;
        if let Some(assignee_id) = input.assignee_id {
            self.require_tenant_user(assignee_id).await?;
        }

        let meta = input
            .meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let row = self
            .client
            .create_work_item(
                crate::store::NewWorkItem {
                    tenant_id: None,
                    kind: input.kind,
                    title: input.title,
                    description: input.description,
                    status: input.status.unwrap_or(WorkItemStatus::Todo),
                    priority: input.priority.unwrap_or(WorkItemPriority::Medium),
                    assignee_id: input.assignee_id,
                    created_by_id: self.actor.user_id,
                    meta,
                },
                QueryOptions::default(),
            )
            .await?;

        let item = self.hydrate_one(row).await?;
        Ok(timer.finish(item))
    }

    /// List work items visible to the actor, most urgent and most recent
    /// first. Actors without `read:all_tickets` only see items they created
    /// or are assigned to.
    #[instrument(skip(self, filters), fields(user_id = %self.actor.user_id, role = %self.actor.role))]
    pub async fn list(&self, filters: WorkItemFilters) -> Result<Timed<Vec<WorkItem>>> {
        let timer = ActionTimer::start("list");
        self.require_capability(Action::ReadTicket)?;

        let rows = self
            .client
            .find_work_items(self.listing_filter(filters, true), QueryOptions::default())
            .await?;
        let items = self.hydrate_many(rows).await?;
        Ok(timer.finish(items))
    }

    /// Fetch one work item. Cross-tenant ids read as absent; items the actor
    /// may not see inside the tenant are an access error, not an absence.
    #[instrument(skip(self), fields(user_id = %self.actor.user_id, role = %self.actor.role, item_id = %id))]
    pub async fn get(&self, id: WorkItemId) -> Result<Timed<WorkItem>> {
        let timer = ActionTimer::start("get");
        self.require_capability(Action::ReadTicket)?;

        let row = self
            .client
            .find_work_item(WorkItemFilter::by_id(id), QueryOptions::default())
            .await?
            .ok_or_else(|| HubError::not_found("work item", id))?;
        if self.restricted() && !self.involves(&row) {
            return Err(HubError::access_denied(
                "you do not have access to this work item",
            ));
        }

        let item = self.hydrate_one(row).await?;
        Ok(timer.finish(item))
    }

    /// Apply a partial update. Access is re-asserted inside the mutation
    /// filter itself, so a row that changes hands between the check and the
    /// write reads as absent instead of being modified.
    #[instrument(skip(self, input), fields(user_id = %self.actor.user_id, role = %self.actor.role, item_id = %input.id))]
    pub async fn update(&self, input: UpdateWorkItem) -> Result<Timed<WorkItem>> {
        let timer = ActionTimer::start("update");
        let id = input.id;
        self.fetch_for_mutation(id, Action::UpdateTicket).await?;

        if let Some(title) = &input.title {
            validate_title(title)?;
        }
        if let Some(Some(assignee_id)) = input.assignee_id {
            self.require_tenant_user(assignee_id).await?;
        }

        let meta = match input.meta {
            None => None,
            Some(None) => Some(None),
            Some(Some(m)) => Some(Some(serde_json::to_string(&m)?)),
        };
        let patch = WorkItemPatch {
            title: input.title,
            description: input.description,
            status: input.status,
            priority: input.priority,
            assignee_id: input.assignee_id,
            meta,
        };

        self.apply_mutation(id, patch).await?;
        let item = self.refetch(id).await?;
        Ok(timer.finish(item))
    }

    /// Delete a work item. Requires the standalone delete capability; the
    /// ownership rules that soften reads and updates do not apply here.
    #[instrument(skip(self), fields(user_id = %self.actor.user_id, role = %self.actor.role, item_id = %id))]
    pub async fn delete(&self, id: WorkItemId) -> Result<Timed<WorkItem>> {
        let timer = ActionTimer::start("delete");
        let row = self.fetch_for_mutation(id, Action::DeleteTicket).await?;
        let item = self.hydrate_one(row).await?;

        let mut filter = WorkItemFilter::by_id(id);
        if self.restricted() {
            filter.involves_user = Some(self.actor.user_id);
        }
        let deleted = self
            .client
            .delete_work_items(filter, QueryOptions::default())
            .await?;
        if deleted == 0 {
            return Err(HubError::not_found("work item", id));
        }
        Ok(timer.finish(item))
    }

    /// Move a work item to a new status.
    #[instrument(skip(self), fields(user_id = %self.actor.user_id, role = %self.actor.role, item_id = %id, status = %status))]
    pub async fn set_status(
        &self,
        id: WorkItemId,
        status: WorkItemStatus,
    ) -> Result<Timed<WorkItem>> {
        let timer = ActionTimer::start("set_status");
        self.fetch_for_mutation(id, Action::UpdateTicket).await?;

        let patch = WorkItemPatch {
            status: Some(status),
            ..WorkItemPatch::default()
        };
        self.apply_mutation(id, patch).await?;
        let item = self.refetch(id).await?;
        Ok(timer.finish(item))
    }

    /// The kanban board: every visible item, grouped by status. Any status
    /// filter in the input is ignored, all four columns are always present.
    #[instrument(skip(self, filters), fields(user_id = %self.actor.user_id, role = %self.actor.role))]
    pub async fn kanban(&self, filters: WorkItemFilters) -> Result<Timed<KanbanBoard>> {
        let timer = ActionTimer::start("kanban");
        self.require_capability(Action::ReadTicket)?;

        let rows = self
            .client
            .find_work_items(self.listing_filter(filters, false), QueryOptions::default())
            .await?;
        let items = self.hydrate_many(rows).await?;
        Ok(timer.finish(KanbanBoard::partition(items)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Capability gate independent of any specific record.
    fn require_capability(&self, action: Action) -> Result<()> {
        if role_allows(self.actor.role, action) {
            Ok(())
        } else {
            Err(HubError::permission_denied(self.actor.role, action))
        }
    }

    fn listing_filter(&self, filters: WorkItemFilters, with_status: bool) -> WorkItemFilter {
        WorkItemFilter {
            tenant_id: None,
            id: None,
            kind: filters.kind,
            status: filters.status.filter(|_| with_status),
            priority: filters.priority,
            assignee_id: filters.assignee_id,
            created_by_id: filters.created_by_id,
            involves_user: self.restricted().then_some(self.actor.user_id),
        }
    }

    /// Fetch the row a mutation targets, applying the same visibility rules
    /// as a read: cross-tenant ids are absent, in-tenant rows the actor is
    /// not involved in are an access error.
    async fn fetch_for_mutation(&self, id: WorkItemId, action: Action) -> Result<WorkItemRow> {
        self.require_capability(action)?;
        let row = self
            .client
            .find_work_item(WorkItemFilter::by_id(id), QueryOptions::default())
            .await?
            .ok_or_else(|| HubError::not_found("work item", id))?;
        if self.restricted() && !self.involves(&row) {
            return Err(HubError::access_denied(
                "you do not have access to this work item",
            ));
        }
        Ok(row)
    }

    /// Run the patch with involvement re-asserted in the mutation filter.
    /// Zero affected rows means the record vanished or changed hands since
    /// the check, which callers see as not found.
    async fn apply_mutation(&self, id: WorkItemId, patch: WorkItemPatch) -> Result<()> {
        let mut filter = WorkItemFilter::by_id(id);
        if self.restricted() {
            filter.involves_user = Some(self.actor.user_id);
        }
        let affected = self
            .client
            .update_work_items(filter, patch, QueryOptions::default())
            .await?;
        if affected == 0 {
            return Err(HubError::not_found("work item", id));
        }
        Ok(())
    }

    /// Read back a row just written by this actor.
    async fn refetch(&self, id: WorkItemId) -> Result<WorkItem> {
        let row = self
            .client
            .find_work_item(WorkItemFilter::by_id(id), QueryOptions::default())
            .await?
            .ok_or_else(|| HubError::not_found("work item", id))?;
        self.hydrate_one(row).await
    }

    async fn require_tenant_user(&self, user_id: UserId) -> Result<()> {
        let found = self
            .client
            .find_user(UserFilter::by_id(user_id), QueryOptions::default())
            .await?;
        if found.is_none() {
            return Err(HubError::validation(format!(
                "assignee {user_id} does not belong to this tenant"
            )));
        }
        Ok(())
    }

    async fn hydrate_one(&self, row: WorkItemRow) -> Result<WorkItem> {
        let mut items = self.hydrate_many(vec![row]).await?;
        items
            .pop()
            .ok_or_else(|| HubError::internal("hydration dropped a row"))
    }

    /// Attach user summaries to raw rows with a single batched lookup.
    async fn hydrate_many(&self, rows: Vec<WorkItemRow>) -> Result<Vec<WorkItem>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<UserId> = Vec::new();
        for row in &rows {
            if !ids.contains(&row.created_by_id) {
                ids.push(row.created_by_id);
            }
            if let Some(assignee) = row.assignee_id {
                if !ids.contains(&assignee) {
                    ids.push(assignee);
                }
            }
        }
        let users = self
            .client
            .find_users(UserFilter::by_ids(ids), QueryOptions::default())
            .await?;
        let summaries: HashMap<UserId, UserSummary> =
            users.into_iter().map(|u| (u.id, u.summary())).collect();

        rows.into_iter()
            .map(|row| {
                let created_by = summaries
                    .get(&row.created_by_id)
                    .cloned()
                    .ok_or_else(|| HubError::internal("work item creator record is missing"))?;
                let assignee = row.assignee_id.and_then(|id| summaries.get(&id).cloned());
                row.into_work_item(created_by, assignee)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::store::models::User;
    use crate::store::{MemoryStore, NewTenant, NewUser};
    use crate::workitems::types::WorkItemKind;

    async fn setup() -> (Arc<MemoryStore>, User) {
        let store = Arc::new(MemoryStore::new());
        let tenant = store
            .create_tenant(NewTenant {
                name: "Acme".to_string(),
                slug: "acme".to_string(),
            })
            .await
            .unwrap();
        let user = store
            .create_user(NewUser {
                email: "staff@acme.test".to_string(),
                name: "Staffer".to_string(),
                role: Role::Staff,
                tenant_id: Some(tenant.id),
            })
            .await
            .unwrap();
        (store, user)
    }

    fn service(store: Arc<MemoryStore>, user: &User) -> WorkItemService {
        WorkItemService::new(store, Actor::new(user.id, user.role, user.tenant_id))
    }

    fn minimal_input(title: &str) -> CreateWorkItem {
        CreateWorkItem {
            kind: WorkItemKind::Ticket,
            title: title.to_string(),
            description: None,
            status: None,
            priority: None,
            assignee_id: None,
            meta: None,
        }
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_creator() {
        let (store, user) = setup().await;
        let svc = service(store, &user);

        let created = svc.create(minimal_input("First")).await.unwrap();
        let item = created.value;
        assert_eq!(item.status, WorkItemStatus::Todo);
        assert_eq!(item.priority, WorkItemPriority::Medium);
        assert_eq!(item.created_by.id, user.id);
        assert_eq!(item.tenant_id, user.tenant_id);
        assert!(item.assignee.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let (store, user) = setup().await;
        let svc = service(store, &user);

        let err = svc.create(minimal_input("   ")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingRequiredField);
    }

    #[tokio::test]
    async fn test_create_rejects_oversized_title() {
        let (store, user) = setup().await;
        let svc = service(store, &user);

        let err = svc
            .create(minimal_input(&"x".repeat(TITLE_MAX_CHARS + 1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_create_rejects_foreign_assignee() {
        let (store, user) = setup().await;
        let other_tenant = store
            .create_tenant(NewTenant {
                name: "Globex".to_string(),
                slug: "globex".to_string(),
            })
            .await
            .unwrap();
        let outsider = store
            .create_user(NewUser {
                email: "out@globex.test".to_string(),
                name: "Outsider".to_string(),
                role: Role::Staff,
                tenant_id: Some(other_tenant.id),
            })
            .await
            .unwrap();
        let svc = service(store, &user);

        let mut input = minimal_input("Assigned out");
        input.assignee_id = Some(outsider.id);
        let err = svc.create(input).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_timed_result_carries_duration() {
        let (store, user) = setup().await;
        let svc = service(store, &user);

        let created = svc.create(minimal_input("Timed")).await.unwrap();
        // Zero is possible on a fast clock, negative is not representable.
        assert!(created.elapsed.as_nanos() < u128::MAX);
    }
}
