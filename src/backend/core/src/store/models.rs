//! Persistence-level record types.
//!
//! Rows carry the `meta` payload as serialized JSON text; conversion to the
//! caller-facing [`WorkItem`] parses it back and attaches user summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::permissions::{Role, TenantId, UserId};
use crate::workitems::types::{
    WorkItem, WorkItemId, WorkItemKind, WorkItemMeta, WorkItemPriority, WorkItemStatus,
};

/// A tenant organization. The root of every scoping decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user account, always belonging to exactly one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: TenantId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// The user projection embedded in hydrated work items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// A work item exactly as stored: foreign keys instead of embedded users,
/// meta as JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemRow {
    pub id: WorkItemId,
    pub tenant_id: TenantId,
    pub kind: WorkItemKind,
    pub title: String,
    pub description: Option<String>,
    pub status: WorkItemStatus,
    pub priority: WorkItemPriority,
    pub assignee_id: Option<UserId>,
    pub created_by_id: UserId,
    pub meta: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItemRow {
    /// Parse the stored meta text back into its structured form.
    pub fn parse_meta(&self) -> Result<Option<WorkItemMeta>> {
        match &self.meta {
            Some(text) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }

    /// Hydrate into the caller-facing shape.
    pub fn into_work_item(
        self,
        created_by: UserSummary,
        assignee: Option<UserSummary>,
    ) -> Result<WorkItem> {
        let meta = self.parse_meta()?;
        Ok(WorkItem {
            id: self.id,
            tenant_id: self.tenant_id,
            kind: self.kind,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            assignee,
            created_by,
            meta,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(meta: Option<String>) -> WorkItemRow {
        WorkItemRow {
            id: WorkItemId::new(),
            tenant_id: TenantId::new(),
            kind: WorkItemKind::Ticket,
            title: "Login broken".to_string(),
            description: None,
            status: WorkItemStatus::Todo,
            priority: WorkItemPriority::High,
            assignee_id: None,
            created_by_id: UserId::new(),
            meta,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_meta_absent() {
        assert_eq!(sample_row(None).parse_meta().unwrap(), None);
    }

    #[test]
    fn test_parse_meta_round_trips_text() {
        let row = sample_row(Some(r#"{"tags":["auth"],"estimatedHours":1.5}"#.to_string()));
        let meta = row.parse_meta().unwrap().unwrap();
        assert_eq!(meta.tags, vec!["auth"]);
        assert_eq!(meta.estimated_hours, Some(1.5));
    }

    #[test]
    fn test_parse_meta_rejects_malformed_text() {
        let row = sample_row(Some("{not json".to_string()));
        assert!(row.parse_meta().is_err());
    }
}
