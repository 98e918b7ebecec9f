//! Permission data models: roles, actions, identifiers, and the check context.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::HubError;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly-typed user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// User role within a tenant. Assigned at creation and immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Staff,
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::Staff => "STAFF",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLIENT" => Ok(Self::Client),
            "STAFF" => Ok(Self::Staff),
            "ADMIN" => Ok(Self::Admin),
            other => Err(HubError::invalid_enum("role", other)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Action
// ═══════════════════════════════════════════════════════════════════════════════

/// An action an actor may attempt, in `verb:resource` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    CreateTicket,
    ReadTicket,
    UpdateTicket,
    DeleteTicket,
    AssignTicket,
    ReadAllTickets,
    ManageUsers,
    ManageTenant,
    ReadProfile,
    UpdateProfile,
    CreateComment,
    ReadComment,
    UpdateComment,
    DeleteComment,
    ReadReports,
    ManageSettings,
    ReadSystemLogs,
    ManageBilling,
    ExportData,
}

impl Action {
    /// Every action, in declaration order.
    pub const ALL: [Action; 19] = [
        Self::CreateTicket,
        Self::ReadTicket,
        Self::UpdateTicket,
        Self::DeleteTicket,
        Self::AssignTicket,
        Self::ReadAllTickets,
        Self::ManageUsers,
        Self::ManageTenant,
        Self::ReadProfile,
        Self::UpdateProfile,
        Self::CreateComment,
        Self::ReadComment,
        Self::UpdateComment,
        Self::DeleteComment,
        Self::ReadReports,
        Self::ManageSettings,
        Self::ReadSystemLogs,
        Self::ManageBilling,
        Self::ExportData,
    ];

    /// Canonical colon-form string, stable across releases.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTicket => "create:ticket",
            Self::ReadTicket => "read:ticket",
            Self::UpdateTicket => "update:ticket",
            Self::DeleteTicket => "delete:ticket",
            Self::AssignTicket => "assign:ticket",
            Self::ReadAllTickets => "read:all_tickets",
            Self::ManageUsers => "manage:users",
            Self::ManageTenant => "manage:tenant",
            Self::ReadProfile => "read:profile",
            Self::UpdateProfile => "update:profile",
            Self::CreateComment => "create:comment",
            Self::ReadComment => "read:comment",
            Self::UpdateComment => "update:comment",
            Self::DeleteComment => "delete:comment",
            Self::ReadReports => "read:reports",
            Self::ManageSettings => "manage:settings",
            Self::ReadSystemLogs => "read:system_logs",
            Self::ManageBilling => "manage:billing",
            Self::ExportData => "export:data",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|a| a.as_str() == s)
            .copied()
            .ok_or_else(|| HubError::invalid_enum("action", s))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the policy needs to decide a single (role, action) check.
///
/// `tenant_id` is carried for logging only; tenant scoping is enforced by the
/// data layer, not by the permission engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionContext {
    pub role: Role,
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
    /// Owner of the resource under check, for ownership-sensitive actions.
    pub resource_owner_id: Option<UserId>,
}

impl PermissionContext {
    /// Context for a check that involves no specific resource.
    pub fn new(role: Role, tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            role,
            tenant_id,
            user_id: Some(user_id),
            resource_owner_id: None,
        }
    }

    /// Attach the owner of the resource under check.
    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.resource_owner_id = Some(owner);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
