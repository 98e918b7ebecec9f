//! Data layer: the storage abstraction, its backends, and the tenant-scoping
//! wrapper every caller goes through.
//!
//! Layering:
//!
//! ```text
//!   actions ──▶ TenantClient (scope.rs) ──▶ dyn Store ──▶ PgStore | MemoryStore
//! ```
//!
//! [`Store`] implementations execute filters literally and apply no tenant
//! logic of their own. Scoping lives entirely in [`scope::TenantClient`],
//! which rewrites filters before they reach a backend.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod scope;

use async_trait::async_trait;

use crate::error::Result;
use crate::permissions::{Role, TenantId, UserId};
use crate::workitems::types::{WorkItemId, WorkItemKind, WorkItemPriority, WorkItemStatus};

use self::models::{Tenant, User, WorkItemRow};

pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;
pub use self::scope::{Entity, QueryOptions, TenantClient};

// ═══════════════════════════════════════════════════════════════════════════════
// New-Record Inputs
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
}

/// `tenant_id` is optional at this level: a scoped client replaces it with
/// the active tenant, so only unscoped or bypassing callers set it.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: Option<TenantId>,
}

/// Raw work-item insert. `meta` is already-serialized JSON text.
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub tenant_id: Option<TenantId>,
    pub kind: WorkItemKind,
    pub title: String,
    pub description: Option<String>,
    pub status: WorkItemStatus,
    pub priority: WorkItemPriority,
    pub assignee_id: Option<UserId>,
    pub created_by_id: UserId,
    pub meta: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Filters and Patches
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    pub id: Option<TenantId>,
    pub slug: Option<String>,
}

impl TenantFilter {
    pub fn by_id(id: TenantId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub tenant_id: Option<TenantId>,
    pub id: Option<UserId>,
    /// Restrict to this id set. `Some(vec![])` matches nothing.
    pub ids: Option<Vec<UserId>>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UserFilter {
    pub fn by_id(id: UserId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn by_ids(ids: Vec<UserId>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }
}

/// Work-item predicate. All present fields are AND-combined.
#[derive(Debug, Clone, Default)]
pub struct WorkItemFilter {
    pub tenant_id: Option<TenantId>,
    pub id: Option<WorkItemId>,
    pub kind: Option<WorkItemKind>,
    pub status: Option<WorkItemStatus>,
    pub priority: Option<WorkItemPriority>,
    pub assignee_id: Option<UserId>,
    pub created_by_id: Option<UserId>,
    /// Matches items where the user is the assignee OR the creator.
    pub involves_user: Option<UserId>,
}

impl WorkItemFilter {
    pub fn by_id(id: WorkItemId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

/// Partial work-item update. Double options follow the input convention:
/// outer `None` leaves the column alone, inner `None` sets it to NULL.
#[derive(Debug, Clone, Default)]
pub struct WorkItemPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<WorkItemStatus>,
    pub priority: Option<WorkItemPriority>,
    pub assignee_id: Option<Option<UserId>>,
    pub meta: Option<Option<String>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Storage backend. Implementations execute the given filters literally;
/// tenant scoping happens above this trait, never inside it.
///
/// Listing order for work items is priority rank descending, then
/// `created_at` descending.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_tenant(&self, filter: &TenantFilter) -> Result<Option<Tenant>>;
    async fn create_tenant(&self, new: NewTenant) -> Result<Tenant>;
    /// Deletes matching tenants and, by cascade, their users and work items.
    /// Returns the number of tenants removed.
    async fn delete_tenants(&self, filter: &TenantFilter) -> Result<u64>;

    async fn find_user(&self, filter: &UserFilter) -> Result<Option<User>>;
    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<User>>;
    async fn create_user(&self, new: NewUser) -> Result<User>;

    async fn find_work_item(&self, filter: &WorkItemFilter) -> Result<Option<WorkItemRow>>;
    async fn find_work_items(&self, filter: &WorkItemFilter) -> Result<Vec<WorkItemRow>>;
    async fn create_work_item(&self, new: NewWorkItem) -> Result<WorkItemRow>;
    /// Applies the patch to every matching row. Returns the affected count;
    /// zero means the filter matched nothing.
    async fn update_work_items(&self, filter: &WorkItemFilter, patch: WorkItemPatch)
        -> Result<u64>;
    async fn delete_work_items(&self, filter: &WorkItemFilter) -> Result<u64>;
}
