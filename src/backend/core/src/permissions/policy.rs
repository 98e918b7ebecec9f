//! Capability matrix and ownership policy evaluation.
//!
//! The policy answers the question:
//! "Can an actor with role R perform action A, given who owns the resource?"
//!
//! Two layers compose:
//!
//! 1. A static capability matrix (role → allowed actions).
//! 2. A declarative per-action ownership policy. Ownership-sensitive actions
//!    grant STAFF and ADMIN unconditionally; CLIENT only when the actor id and
//!    the resource owner id are both present and equal.

use tracing::debug;

use super::models::{Action, PermissionContext, Role};
use crate::error::{HubError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Capability Matrix
// ═══════════════════════════════════════════════════════════════════════════════

/// Actions a CLIENT may attempt. Ticket/comment reads and updates are further
/// restricted to owned resources by the ownership policy.
const CLIENT_ACTIONS: &[Action] = &[
    Action::CreateTicket,
    Action::ReadTicket,
    Action::UpdateTicket,
    Action::ReadProfile,
    Action::UpdateProfile,
    Action::CreateComment,
    Action::ReadComment,
    Action::UpdateComment,
];

const STAFF_ACTIONS: &[Action] = &[
    Action::CreateTicket,
    Action::ReadTicket,
    Action::UpdateTicket,
    Action::AssignTicket,
    Action::ReadAllTickets,
    Action::ReadProfile,
    Action::UpdateProfile,
    Action::CreateComment,
    Action::ReadComment,
    Action::UpdateComment,
    Action::DeleteComment,
    Action::ReadReports,
];

const ADMIN_ACTIONS: &[Action] = &[
    Action::CreateTicket,
    Action::ReadTicket,
    Action::UpdateTicket,
    Action::DeleteTicket,
    Action::AssignTicket,
    Action::ReadAllTickets,
    Action::ManageUsers,
    Action::ManageTenant,
    Action::ReadProfile,
    Action::UpdateProfile,
    Action::CreateComment,
    Action::ReadComment,
    Action::UpdateComment,
    Action::DeleteComment,
    Action::ReadReports,
    Action::ManageSettings,
    Action::ReadSystemLogs,
    Action::ManageBilling,
    Action::ExportData,
];

/// The static capability set for a role.
pub const fn capabilities(role: Role) -> &'static [Action] {
    match role {
        Role::Client => CLIENT_ACTIONS,
        Role::Staff => STAFF_ACTIONS,
        Role::Admin => ADMIN_ACTIONS,
    }
}

/// Matrix membership only: is `action` in `role`'s static capability set?
///
/// This is the capability gate used by work-item actions before the target
/// record (and therefore its owner) is known; the ownership half of the
/// decision is applied separately once the record is loaded.
pub fn role_allows(role: Role, action: Action) -> bool {
    capabilities(role).contains(&action)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ownership Policy
// ═══════════════════════════════════════════════════════════════════════════════

/// Which principal counts as the owner for an ownership-sensitive action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerField {
    /// The work item's creator.
    Creator,
    /// The comment's author.
    Author,
}

/// Per-action ownership requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipPolicy {
    pub requires_ownership: bool,
    pub owner: Option<OwnerField>,
}

impl OwnershipPolicy {
    const NONE: Self = Self {
        requires_ownership: false,
        owner: None,
    };

    const fn owned_by(owner: OwnerField) -> Self {
        Self {
            requires_ownership: true,
            owner: Some(owner),
        }
    }
}

/// Declarative ownership policy table, exhaustive over every action.
pub const fn ownership_policy(action: Action) -> OwnershipPolicy {
    match action {
        Action::ReadTicket | Action::UpdateTicket => OwnershipPolicy::owned_by(OwnerField::Creator),
        Action::UpdateComment => OwnershipPolicy::owned_by(OwnerField::Author),
        Action::CreateTicket
        | Action::DeleteTicket
        | Action::AssignTicket
        | Action::ReadAllTickets
        | Action::ManageUsers
        | Action::ManageTenant
        | Action::ReadProfile
        | Action::UpdateProfile
        | Action::CreateComment
        | Action::ReadComment
        | Action::DeleteComment
        | Action::ReadReports
        | Action::ManageSettings
        | Action::ReadSystemLogs
        | Action::ManageBilling
        | Action::ExportData => OwnershipPolicy::NONE,
    }
}

fn check_ownership(context: &PermissionContext) -> bool {
    match context.role {
        // Elevated roles bypass ownership entirely.
        Role::Staff | Role::Admin => true,
        // CLIENT requires both ids present and equal.
        Role::Client => match (context.user_id, context.resource_owner_id) {
            (Some(user), Some(owner)) => user == owner,
            _ => false,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════════════════════════

/// Check whether the context allows an action.
pub fn can(context: &PermissionContext, action: Action) -> bool {
    if !role_allows(context.role, action) {
        return false;
    }

    if ownership_policy(action).requires_ownership {
        return check_ownership(context);
    }

    true
}

/// Enforce a check: `Ok(())` if allowed, `PermissionDenied` otherwise.
pub fn authorize(context: &PermissionContext, action: Action) -> Result<()> {
    if can(context, action) {
        Ok(())
    } else {
        debug!(
            role = %context.role,
            action = %action,
            tenant_id = %context.tenant_id,
            "Permission denied"
        );
        Err(HubError::permission_denied(context.role, action))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Utilities
// ═══════════════════════════════════════════════════════════════════════════════

/// All actions in a role's static capability set.
pub fn role_actions(role: Role) -> Vec<Action> {
    capabilities(role).to_vec()
}

/// Check multiple actions; allowed only if ALL are granted.
pub fn can_all(context: &PermissionContext, actions: &[Action]) -> bool {
    actions.iter().all(|&action| can(context, action))
}

/// Filter a candidate list down to the allowed subset.
///
/// With no candidates given, every known action is considered.
pub fn allowed_actions(context: &PermissionContext, candidates: Option<&[Action]>) -> Vec<Action> {
    candidates
        .unwrap_or(&Action::ALL)
        .iter()
        .copied()
        .filter(|&action| can(context, action))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::models::{TenantId, UserId};

    fn ctx(role: Role) -> PermissionContext {
        PermissionContext::new(role, TenantId::new(), UserId::new())
    }

    #[test]
    fn test_client_cannot_manage_users() {
        assert!(!can(&ctx(Role::Client), Action::ManageUsers));
    }

    #[test]
    fn test_admin_can_manage_tenant() {
        assert!(can(&ctx(Role::Admin), Action::ManageTenant));
    }

    #[test]
    fn test_staff_can_read_all_tickets() {
        assert!(can(&ctx(Role::Staff), Action::ReadAllTickets));
        assert!(!can(&ctx(Role::Client), Action::ReadAllTickets));
    }

    #[test]
    fn test_staff_cannot_delete_tickets() {
        assert!(!can(&ctx(Role::Staff), Action::DeleteTicket));
        assert!(can(&ctx(Role::Admin), Action::DeleteTicket));
    }

    #[test]
    fn test_client_ownership_gate() {
        let user = UserId::new();
        let tenant = TenantId::new();

        let owned = PermissionContext::new(Role::Client, tenant, user).with_owner(user);
        assert!(can(&owned, Action::ReadTicket));
        assert!(can(&owned, Action::UpdateTicket));

        let foreign = PermissionContext::new(Role::Client, tenant, user).with_owner(UserId::new());
        assert!(!can(&foreign, Action::ReadTicket));
        assert!(!can(&foreign, Action::UpdateTicket));
    }

    #[test]
    fn test_missing_ids_deny_ownership() {
        let tenant = TenantId::new();

        // Owner unknown.
        let no_owner = PermissionContext::new(Role::Client, tenant, UserId::new());
        assert!(!can(&no_owner, Action::ReadTicket));

        // Actor unknown.
        let no_user = PermissionContext {
            role: Role::Client,
            tenant_id: tenant,
            user_id: None,
            resource_owner_id: Some(UserId::new()),
        };
        assert!(!can(&no_user, Action::UpdateTicket));
    }

    #[test]
    fn test_elevated_roles_ignore_ownership() {
        let tenant = TenantId::new();
        for role in [Role::Staff, Role::Admin] {
            let foreign =
                PermissionContext::new(role, tenant, UserId::new()).with_owner(UserId::new());
            assert!(can(&foreign, Action::ReadTicket));
            assert!(can(&foreign, Action::UpdateTicket));
            assert!(can(&foreign, Action::UpdateComment));
        }
    }

    #[test]
    fn test_authorize_error_names_role_and_action() {
        let err = authorize(&ctx(Role::Client), Action::ManageBilling).unwrap_err();
        assert!(err.message().contains("CLIENT"));
        assert!(err.message().contains("manage:billing"));
    }

    #[test]
    fn test_ownership_policy_table() {
        assert!(ownership_policy(Action::ReadTicket).requires_ownership);
        assert!(ownership_policy(Action::UpdateTicket).requires_ownership);
        assert_eq!(
            ownership_policy(Action::UpdateComment).owner,
            Some(OwnerField::Author)
        );
        assert!(!ownership_policy(Action::DeleteTicket).requires_ownership);
        assert!(!ownership_policy(Action::CreateTicket).requires_ownership);
    }

    #[test]
    fn test_can_all_is_logical_and() {
        let context = ctx(Role::Staff);
        assert!(can_all(
            &context,
            &[Action::CreateTicket, Action::ReadAllTickets]
        ));
        assert!(!can_all(
            &context,
            &[Action::CreateTicket, Action::ManageBilling]
        ));
    }

    #[test]
    fn test_allowed_actions_filters_candidates() {
        let context = ctx(Role::Staff);
        let candidates = [
            Action::CreateTicket,
            Action::DeleteTicket,
            Action::ReadReports,
        ];
        let allowed = allowed_actions(&context, Some(&candidates));
        assert_eq!(allowed, vec![Action::CreateTicket, Action::ReadReports]);
    }

    #[test]
    fn test_allowed_actions_defaults_to_all() {
        let context = ctx(Role::Admin);
        let allowed = allowed_actions(&context, None);
        assert_eq!(allowed.len(), Action::ALL.len());
    }

    #[test]
    fn test_role_actions_matches_matrix() {
        assert_eq!(role_actions(Role::Client).len(), 8);
        assert_eq!(role_actions(Role::Staff).len(), 12);
        assert_eq!(role_actions(Role::Admin).len(), Action::ALL.len());
    }
}
