//! Tenant scoping.
//!
//! [`TenantClient`] wraps a [`Store`] and rewrites every query so it cannot
//! cross tenant boundaries. Scoping is applied per entity according to the
//! exhaustive [`Entity`] mapping, and can be lifted per call with
//! [`QueryOptions::bypass`] or structurally with [`TenantClient::unscoped`].
//! The bypass flag is consumed here; backends never see it.

use std::sync::Arc;

use tracing::trace;

use crate::error::Result;
use crate::permissions::TenantId;
use crate::store::models::{Tenant, User, WorkItemRow};
use crate::store::{
    NewTenant, NewUser, NewWorkItem, Store, TenantFilter, UserFilter, WorkItemFilter,
    WorkItemPatch,
};
use crate::telemetry::metrics::record_store_query;

// ═══════════════════════════════════════════════════════════════════════════════
// Entity Mapping
// ═══════════════════════════════════════════════════════════════════════════════

/// Every entity the store knows about. Adding a variant forces a decision in
/// [`Entity::tenant_scoped`], so no entity can silently escape scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Tenant,
    User,
    WorkItem,
}

impl Entity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::User => "user",
            Self::WorkItem => "work_item",
        }
    }

    /// Whether rows of this entity belong to a tenant. Tenants themselves are
    /// the scoping root and pass through untouched.
    pub const fn tenant_scoped(&self) -> bool {
        match self {
            Self::Tenant => false,
            Self::User | Self::WorkItem => true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Per-Call Options
// ═══════════════════════════════════════════════════════════════════════════════

/// Options attached to a single call. The default applies full scoping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Skip tenant injection for this one call. The caller's filter runs
    /// exactly as written.
    pub bypass_tenant: bool,
}

impl QueryOptions {
    pub const fn bypass() -> Self {
        Self { bypass_tenant: true }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tenant Client
// ═══════════════════════════════════════════════════════════════════════════════

/// A store handle bound to at most one tenant.
///
/// A scoped client overwrites the tenant field of every filter on reads,
/// updates, and deletes, and of every payload on creates. An unscoped
/// client passes queries through unchanged and exists for system
/// administration paths that legitimately span tenants.
#[derive(Clone)]
pub struct TenantClient {
    store: Arc<dyn Store>,
    tenant: Option<TenantId>,
}

impl TenantClient {
    /// A client confined to one tenant.
    pub fn scoped(store: Arc<dyn Store>, tenant: TenantId) -> Self {
        Self {
            store,
            tenant: Some(tenant),
        }
    }

    /// A client with no tenant confinement.
    pub fn unscoped(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            tenant: None,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant
    }

    /// The tenant to inject for this call, or `None` when scoping does not
    /// apply (unscoped client, bypass option, or unscoped entity).
    fn injected_tenant(&self, entity: Entity, opts: QueryOptions) -> Option<TenantId> {
        if opts.bypass_tenant || !entity.tenant_scoped() {
            return None;
        }
        let tenant = self.tenant?;
        trace!(
            entity = entity.as_str(),
            tenant_id = %tenant,
            "injecting tenant scope"
        );
        Some(tenant)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tenants (unscoped entity, passthrough)
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn find_tenant(&self, filter: &TenantFilter) -> Result<Option<Tenant>> {
        record_store_query(Entity::Tenant.as_str(), "find");
        self.store.find_tenant(filter).await
    }

    pub async fn create_tenant(&self, new: NewTenant) -> Result<Tenant> {
        record_store_query(Entity::Tenant.as_str(), "create");
        self.store.create_tenant(new).await
    }

    pub async fn delete_tenants(&self, filter: &TenantFilter) -> Result<u64> {
        record_store_query(Entity::Tenant.as_str(), "delete_many");
        self.store.delete_tenants(filter).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn find_user(
        &self,
        mut filter: UserFilter,
        opts: QueryOptions,
    ) -> Result<Option<User>> {
        if let Some(tenant) = self.injected_tenant(Entity::User, opts) {
            filter.tenant_id = Some(tenant);
        }
        record_store_query(Entity::User.as_str(), "find");
        self.store.find_user(&filter).await
    }

    pub async fn find_users(
        &self,
        mut filter: UserFilter,
        opts: QueryOptions,
    ) -> Result<Vec<User>> {
        if let Some(tenant) = self.injected_tenant(Entity::User, opts) {
            filter.tenant_id = Some(tenant);
        }
        record_store_query(Entity::User.as_str(), "find_many");
        self.store.find_users(&filter).await
    }

    pub async fn create_user(&self, mut new: NewUser, opts: QueryOptions) -> Result<User> {
        if let Some(tenant) = self.injected_tenant(Entity::User, opts) {
            new.tenant_id = Some(tenant);
        }
        record_store_query(Entity::User.as_str(), "create");
        self.store.create_user(new).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Work Items
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn find_work_item(
        &self,
        mut filter: WorkItemFilter,
        opts: QueryOptions,
    ) -> Result<Option<WorkItemRow>> {
        if let Some(tenant) = self.injected_tenant(Entity::WorkItem, opts) {
            filter.tenant_id = Some(tenant);
        }
        record_store_query(Entity::WorkItem.as_str(), "find");
        self.store.find_work_item(&filter).await
    }

    pub async fn find_work_items(
        &self,
        mut filter: WorkItemFilter,
        opts: QueryOptions,
    ) -> Result<Vec<WorkItemRow>> {
        if let Some(tenant) = self.injected_tenant(Entity::WorkItem, opts) {
            filter.tenant_id = Some(tenant);
        }
        record_store_query(Entity::WorkItem.as_str(), "find_many");
        self.store.find_work_items(&filter).await
    }

    pub async fn create_work_item(
        &self,
        mut new: NewWorkItem,
        opts: QueryOptions,
    ) -> Result<WorkItemRow> {
        if let Some(tenant) = self.injected_tenant(Entity::WorkItem, opts) {
            new.tenant_id = Some(tenant);
        }
        record_store_query(Entity::WorkItem.as_str(), "create");
        self.store.create_work_item(new).await
    }

    pub async fn update_work_items(
        &self,
        mut filter: WorkItemFilter,
        patch: WorkItemPatch,
        opts: QueryOptions,
    ) -> Result<u64> {
        if let Some(tenant) = self.injected_tenant(Entity::WorkItem, opts) {
            filter.tenant_id = Some(tenant);
        }
        record_store_query(Entity::WorkItem.as_str(), "update_many");
        self.store.update_work_items(&filter, patch).await
    }

    pub async fn delete_work_items(
        &self,
        mut filter: WorkItemFilter,
        opts: QueryOptions,
    ) -> Result<u64> {
        if let Some(tenant) = self.injected_tenant(Entity::WorkItem, opts) {
            filter.tenant_id = Some(tenant);
        }
        record_store_query(Entity::WorkItem.as_str(), "delete_many");
        self.store.delete_work_items(&filter).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
