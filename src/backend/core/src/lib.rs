#![allow(clippy::result_large_err)]
//! # TicketHub Core
//!
//! Multi-tenant work-item engine: permissions, tenant isolation, and the
//! ticket/task operations built on both.
//!
//! ## Architecture
//!
//! - **Permissions**: Static role/action matrix plus a declarative ownership
//!   policy table
//! - **Store**: A storage trait with PostgreSQL and in-memory backends, and a
//!   tenant-scoping client that rewrites every query before it reaches them
//! - **Work Items**: Actor-facing operations with timed results
//! - **Telemetry**: Structured logging with redaction, and Prometheus metrics

pub mod config;
pub mod error;
pub mod permissions;
pub mod store;
pub mod telemetry;
pub mod workitems;

pub use error::{ErrorCode, HubError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, HubError, Result};
    pub use crate::permissions::{
        allowed_actions, authorize, can, role_allows, Action, PermissionContext, Role, TenantId,
        UserId,
    };
    pub use crate::store::{
        Entity, MemoryStore, PgStore, QueryOptions, Store, TenantClient, TenantFilter, UserFilter,
        WorkItemFilter,
    };
    pub use crate::workitems::{
        Actor, CreateWorkItem, KanbanBoard, Timed, UpdateWorkItem, WorkItem, WorkItemFilters,
        WorkItemId, WorkItemKind, WorkItemMeta, WorkItemPriority, WorkItemService, WorkItemStatus,
    };
}
