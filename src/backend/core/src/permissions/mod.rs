//! Role-based permission engine.
//!
//! This module provides:
//! - **Models**: `Role`, `Action`, and the `PermissionContext` for a check
//! - **Policy**: the static capability matrix plus a declarative per-action
//!   ownership table, evaluated uniformly by [`can`] and [`authorize`]
//!
//! The engine is pure: it never touches the store. Tenant isolation is the
//! data layer's job (see [`crate::store`]); the context's tenant id is carried
//! only for log correlation.
//!
//! # Usage
//!
//! ```rust
//! use tickethub_core::permissions::{
//!     authorize, can, Action, PermissionContext, Role, TenantId, UserId,
//! };
//!
//! let ctx = PermissionContext::new(Role::Staff, TenantId::new(), UserId::new());
//! assert!(can(&ctx, Action::ReadAllTickets));
//! assert!(authorize(&ctx, Action::ManageBilling).is_err());
//! ```

pub mod models;
pub mod policy;

pub use models::{Action, PermissionContext, Role, TenantId, UserId};
pub use policy::{
    allowed_actions, authorize, can, can_all, capabilities, ownership_policy, role_actions,
    role_allows, OwnerField, OwnershipPolicy,
};
