//! In-memory [`Store`] backend.
//!
//! Backs unit and integration tests. Mirrors the relational backend's
//! observable behavior: unique slug and email constraints, cascade on tenant
//! deletion, and the fixed work-item listing order.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{ErrorCode, HubError, Result};
use crate::permissions::{TenantId, UserId};
use crate::store::models::{Tenant, User, WorkItemRow};
use crate::store::{
    NewTenant, NewUser, NewWorkItem, Store, TenantFilter, UserFilter, WorkItemFilter,
    WorkItemPatch,
};
use crate::workitems::types::WorkItemId;

#[derive(Default)]
struct Inner {
    tenants: Vec<Tenant>,
    users: Vec<User>,
    /// Rows paired with an insertion sequence, the final ordering tie-break.
    items: Vec<(u64, WorkItemRow)>,
    next_seq: u64,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate(what: &str) -> HubError {
    HubError::new(
        ErrorCode::DuplicateRecord,
        format!("a record with this {what} already exists"),
    )
}

fn missing_tenant() -> HubError {
    HubError::new(
        ErrorCode::MissingRequiredField,
        "tenant_id is required for this record",
    )
}

fn tenant_matches(filter: &TenantFilter, tenant: &Tenant) -> bool {
    filter.id.map_or(true, |id| tenant.id == id)
        && filter.slug.as_deref().map_or(true, |s| tenant.slug == s)
}

fn user_matches(filter: &UserFilter, user: &User) -> bool {
    filter.tenant_id.map_or(true, |t| user.tenant_id == t)
        && filter.id.map_or(true, |id| user.id == id)
        && filter
            .ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&user.id))
        && filter.email.as_deref().map_or(true, |e| user.email == e)
        && filter.role.map_or(true, |r| user.role == r)
}

fn item_matches(filter: &WorkItemFilter, row: &WorkItemRow) -> bool {
    filter.tenant_id.map_or(true, |t| row.tenant_id == t)
        && filter.id.map_or(true, |id| row.id == id)
        && filter.kind.map_or(true, |k| row.kind == k)
        && filter.status.map_or(true, |s| row.status == s)
        && filter.priority.map_or(true, |p| row.priority == p)
        && filter.assignee_id.map_or(true, |a| row.assignee_id == Some(a))
        && filter.created_by_id.map_or(true, |c| row.created_by_id == c)
        && filter
            .involves_user
            .map_or(true, |u| row.assignee_id == Some(u) || row.created_by_id == u)
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_tenant(&self, filter: &TenantFilter) -> Result<Option<Tenant>> {
        let inner = self.inner.read();
        Ok(inner
            .tenants
            .iter()
            .find(|t| tenant_matches(filter, t))
            .cloned())
    }

    async fn create_tenant(&self, new: NewTenant) -> Result<Tenant> {
        let mut inner = self.inner.write();
        if inner.tenants.iter().any(|t| t.slug == new.slug) {
            return Err(duplicate("slug"));
        }
        let now = Utc::now();
        let tenant = Tenant {
            id: TenantId::new(),
            name: new.name,
            slug: new.slug,
            created_at: now,
            updated_at: now,
        };
        inner.tenants.push(tenant.clone());
        Ok(tenant)
    }

    async fn delete_tenants(&self, filter: &TenantFilter) -> Result<u64> {
        let mut inner = self.inner.write();
        let doomed: Vec<TenantId> = inner
            .tenants
            .iter()
            .filter(|t| tenant_matches(filter, t))
            .map(|t| t.id)
            .collect();
        inner.tenants.retain(|t| !doomed.contains(&t.id));
        inner.users.retain(|u| !doomed.contains(&u.tenant_id));
        inner
            .items
            .retain(|(_, row)| !doomed.contains(&row.tenant_id));
        Ok(doomed.len() as u64)
    }

    async fn find_user(&self, filter: &UserFilter) -> Result<Option<User>> {
        let inner = self.inner.read();
        Ok(inner
            .users
            .iter()
            .find(|u| user_matches(filter, u))
            .cloned())
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let inner = self.inner.read();
        Ok(inner
            .users
            .iter()
            .filter(|u| user_matches(filter, u))
            .cloned()
            .collect())
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let tenant_id = new.tenant_id.ok_or_else(missing_tenant)?;
        let mut inner = self.inner.write();
        if inner.users.iter().any(|u| u.email == new.email) {
            return Err(duplicate("email"));
        }
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email: new.email,
            name: new.name,
            role: new.role,
            tenant_id,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_work_item(&self, filter: &WorkItemFilter) -> Result<Option<WorkItemRow>> {
        let inner = self.inner.read();
        Ok(inner
            .items
            .iter()
            .find(|(_, row)| item_matches(filter, row))
            .map(|(_, row)| row.clone()))
    }

    async fn find_work_items(&self, filter: &WorkItemFilter) -> Result<Vec<WorkItemRow>> {
        let inner = self.inner.read();
        let mut matched: Vec<(u64, WorkItemRow)> = inner
            .items
            .iter()
            .filter(|(_, row)| item_matches(filter, row))
            .cloned()
            .collect();
        matched.sort_by(|(seq_a, a), (seq_b, b)| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then(b.created_at.cmp(&a.created_at))
                .then(seq_b.cmp(seq_a))
        });
        Ok(matched.into_iter().map(|(_, row)| row).collect())
    }

    async fn create_work_item(&self, new: NewWorkItem) -> Result<WorkItemRow> {
        let tenant_id = new.tenant_id.ok_or_else(missing_tenant)?;
        let mut inner = self.inner.write();
        let now = Utc::now();
        let row = WorkItemRow {
            id: WorkItemId::new(),
            tenant_id,
            kind: new.kind,
            title: new.title,
            description: new.description,
            status: new.status,
            priority: new.priority,
            assignee_id: new.assignee_id,
            created_by_id: new.created_by_id,
            meta: new.meta,
            created_at: now,
            updated_at: now,
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.items.push((seq, row.clone()));
        Ok(row)
    }

    async fn update_work_items(
        &self,
        filter: &WorkItemFilter,
        patch: WorkItemPatch,
    ) -> Result<u64> {
        let mut inner = self.inner.write();
        let now = Utc::now();
        let mut affected = 0u64;
        for (_, row) in inner.items.iter_mut() {
            if !item_matches(filter, row) {
                continue;
            }
            if let Some(title) = &patch.title {
                row.title = title.clone();
            }
            if let Some(description) = &patch.description {
                row.description = description.clone();
            }
            if let Some(status) = patch.status {
                row.status = status;
            }
            if let Some(priority) = patch.priority {
                row.priority = priority;
            }
            if let Some(assignee_id) = patch.assignee_id {
                row.assignee_id = assignee_id;
            }
            if let Some(meta) = &patch.meta {
                row.meta = meta.clone();
            }
            row.updated_at = now;
            affected += 1;
        }
        Ok(affected)
    }

    async fn delete_work_items(&self, filter: &WorkItemFilter) -> Result<u64> {
        let mut inner = self.inner.write();
        let before = inner.items.len();
        inner.items.retain(|(_, row)| !item_matches(filter, row));
        Ok((before - inner.items.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Role;
    use crate::workitems::types::{WorkItemKind, WorkItemPriority, WorkItemStatus};

    async fn seed_tenant(store: &MemoryStore, slug: &str) -> (TenantId, UserId) {
        let tenant = store
            .create_tenant(NewTenant {
                name: slug.to_uppercase(),
                slug: slug.to_string(),
            })
            .await
            .unwrap();
        let user = store
            .create_user(NewUser {
                email: format!("{slug}@example.com"),
                name: "Seed".to_string(),
                role: Role::Staff,
                tenant_id: Some(tenant.id),
            })
            .await
            .unwrap();
        (tenant.id, user.id)
    }

    fn item(
        tenant: TenantId,
        creator: UserId,
        priority: WorkItemPriority,
        title: &str,
    ) -> NewWorkItem {
        NewWorkItem {
            tenant_id: Some(tenant),
            kind: WorkItemKind::Task,
            title: title.to_string(),
            description: None,
            status: WorkItemStatus::Todo,
            priority,
            assignee_id: None,
            created_by_id: creator,
            meta: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let store = MemoryStore::new();
        seed_tenant(&store, "acme").await;
        let err = store
            .create_tenant(NewTenant {
                name: "Acme 2".to_string(),
                slug: "acme".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        let (tenant, _) = seed_tenant(&store, "acme").await;
        let err = store
            .create_user(NewUser {
                email: "acme@example.com".to_string(),
                name: "Again".to_string(),
                role: Role::Client,
                tenant_id: Some(tenant),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);
    }

    #[tokio::test]
    async fn test_listing_order_priority_then_recency() {
        let store = MemoryStore::new();
        let (tenant, creator) = seed_tenant(&store, "acme").await;
        store
            .create_work_item(item(tenant, creator, WorkItemPriority::Low, "old-low"))
            .await
            .unwrap();
        store
            .create_work_item(item(tenant, creator, WorkItemPriority::Urgent, "urgent"))
            .await
            .unwrap();
        store
            .create_work_item(item(tenant, creator, WorkItemPriority::Low, "new-low"))
            .await
            .unwrap();

        let titles: Vec<String> = store
            .find_work_items(&WorkItemFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["urgent", "new-low", "old-low"]);
    }

    #[tokio::test]
    async fn test_involves_user_matches_assignee_or_creator() {
        let store = MemoryStore::new();
        let (tenant, creator) = seed_tenant(&store, "acme").await;
        let other = store
            .create_user(NewUser {
                email: "other@example.com".to_string(),
                name: "Other".to_string(),
                role: Role::Client,
                tenant_id: Some(tenant),
            })
            .await
            .unwrap();

        store
            .create_work_item(item(tenant, creator, WorkItemPriority::Medium, "mine"))
            .await
            .unwrap();
        let mut assigned = item(tenant, other.id, WorkItemPriority::Medium, "assigned");
        assigned.assignee_id = Some(creator);
        store.create_work_item(assigned).await.unwrap();
        store
            .create_work_item(item(tenant, other.id, WorkItemPriority::Medium, "theirs"))
            .await
            .unwrap();

        let filter = WorkItemFilter {
            involves_user: Some(creator),
            ..WorkItemFilter::default()
        };
        let mut titles: Vec<String> = store
            .find_work_items(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["assigned", "mine"]);
    }

    #[tokio::test]
    async fn test_tenant_delete_cascades() {
        let store = MemoryStore::new();
        let (tenant, creator) = seed_tenant(&store, "acme").await;
        store
            .create_work_item(item(tenant, creator, WorkItemPriority::Medium, "doomed"))
            .await
            .unwrap();

        let removed = store
            .delete_tenants(&TenantFilter::by_id(tenant))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .find_user(&UserFilter::by_id(creator))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_work_items(&WorkItemFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_empty_patch_counts_matching_rows() {
        let store = MemoryStore::new();
        let (tenant, creator) = seed_tenant(&store, "acme").await;
        let row = store
            .create_work_item(item(tenant, creator, WorkItemPriority::Medium, "present"))
            .await
            .unwrap();

        let affected = store
            .update_work_items(&WorkItemFilter::by_id(row.id), WorkItemPatch::default())
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let missing = store
            .update_work_items(
                &WorkItemFilter::by_id(WorkItemId::new()),
                WorkItemPatch::default(),
            )
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn test_patch_clears_nullable_fields() {
        let store = MemoryStore::new();
        let (tenant, creator) = seed_tenant(&store, "acme").await;
        let mut new = item(tenant, creator, WorkItemPriority::Medium, "to-clear");
        new.description = Some("something".to_string());
        new.assignee_id = Some(creator);
        let row = store.create_work_item(new).await.unwrap();

        let patch = WorkItemPatch {
            description: Some(None),
            assignee_id: Some(None),
            ..WorkItemPatch::default()
        };
        let affected = store
            .update_work_items(&WorkItemFilter::by_id(row.id), patch)
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let updated = store
            .find_work_item(&WorkItemFilter::by_id(row.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.description, None);
        assert_eq!(updated.assignee_id, None);
    }
}
