//! Work-item domain types: closed enumerations, meta payload, inputs, and
//! result shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::HubError;
use crate::permissions::{PermissionContext, Role, TenantId, UserId};
use crate::store::models::UserSummary;

// ═══════════════════════════════════════════════════════════════════════════════
// Identifier
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed work-item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct WorkItemId(pub Uuid);

impl WorkItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Closed Enumerations
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of work item. Both kinds share the ticket permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemKind {
    Ticket,
    Task,
}

impl WorkItemKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticket => "TICKET",
            Self::Task => "TASK",
        }
    }
}

impl fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkItemKind {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TICKET" => Ok(Self::Ticket),
            "TASK" => Ok(Self::Task),
            other => Err(HubError::invalid_enum("work item kind", other)),
        }
    }
}

/// Workflow status. The kanban board has one fixed column per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemStatus {
    Todo,
    InProgress,
    Qa,
    Done,
}

impl WorkItemStatus {
    /// Every status, in board column order.
    pub const ALL: [WorkItemStatus; 4] = [Self::Todo, Self::InProgress, Self::Qa, Self::Done];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Qa => "QA",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkItemStatus {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "QA" => Ok(Self::Qa),
            "DONE" => Ok(Self::Done),
            other => Err(HubError::invalid_enum("work item status", other)),
        }
    }
}

/// Priority. Ordering in listings is rank-descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl WorkItemPriority {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }

    /// Sort rank: URGENT > HIGH > MEDIUM > LOW.
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Urgent => 4,
        }
    }
}

impl fmt::Display for WorkItemPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkItemPriority {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            other => Err(HubError::invalid_enum("work item priority", other)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Meta Payload
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque structured payload attached to a work item.
///
/// Persisted as serialized JSON text and parsed back on every read, so callers
/// always see the structured form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Any further fields callers attach.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Actor
// ═══════════════════════════════════════════════════════════════════════════════

/// The authenticated principal attached to every inbound operation by the
/// session collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub tenant_id: TenantId,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, tenant_id: TenantId) -> Self {
        Self {
            user_id,
            role,
            tenant_id,
        }
    }

    /// Permission context for a check that involves no specific resource.
    pub fn permission_context(&self) -> PermissionContext {
        PermissionContext::new(self.role, self.tenant_id, self.user_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Inputs
// ═══════════════════════════════════════════════════════════════════════════════

/// Input for creating a work item. Status and priority default to TODO/MEDIUM.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkItem {
    pub kind: WorkItemKind,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<WorkItemStatus>,
    #[serde(default)]
    pub priority: Option<WorkItemPriority>,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
    #[serde(default)]
    pub meta: Option<WorkItemMeta>,
}

/// Partial update: outer `None` leaves a field untouched; for clearable fields
/// the inner `None` clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkItem {
    pub id: WorkItemId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<WorkItemStatus>,
    #[serde(default)]
    pub priority: Option<WorkItemPriority>,
    #[serde(default, with = "double_option")]
    pub assignee_id: Option<Option<UserId>>,
    #[serde(default, with = "double_option")]
    pub meta: Option<Option<WorkItemMeta>>,
}

/// Serde helper: a present-but-null JSON field deserializes to `Some(None)`,
/// an absent field to `None`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Optional, AND-combined listing filters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WorkItemFilters {
    #[serde(default)]
    pub kind: Option<WorkItemKind>,
    #[serde(default)]
    pub status: Option<WorkItemStatus>,
    #[serde(default)]
    pub priority: Option<WorkItemPriority>,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
    #[serde(default)]
    pub created_by_id: Option<UserId>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Results
// ═══════════════════════════════════════════════════════════════════════════════

/// A work item as seen by callers: parsed meta and hydrated user summaries.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub tenant_id: TenantId,
    pub kind: WorkItemKind,
    pub title: String,
    pub description: Option<String>,
    pub status: WorkItemStatus,
    pub priority: WorkItemPriority,
    pub assignee: Option<UserSummary>,
    pub created_by: UserSummary,
    pub meta: Option<WorkItemMeta>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A value plus the wall-clock duration the operation took.
///
/// The duration is an observability signal; it is also recorded as a
/// histogram by the action layer.
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn new(value: T, elapsed: Duration) -> Self {
        Self { value, elapsed }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Work items partitioned into the four fixed kanban columns, preserving list
/// order within each column.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KanbanBoard {
    pub todo: Vec<WorkItem>,
    pub in_progress: Vec<WorkItem>,
    pub qa: Vec<WorkItem>,
    pub done: Vec<WorkItem>,
}

impl KanbanBoard {
    /// Partition a list into columns, preserving input order.
    pub fn partition(items: Vec<WorkItem>) -> Self {
        let mut board = Self::default();
        for item in items {
            board.column_mut(item.status).push(item);
        }
        board
    }

    pub fn column(&self, status: WorkItemStatus) -> &[WorkItem] {
        match status {
            WorkItemStatus::Todo => &self.todo,
            WorkItemStatus::InProgress => &self.in_progress,
            WorkItemStatus::Qa => &self.qa,
            WorkItemStatus::Done => &self.done,
        }
    }

    fn column_mut(&mut self, status: WorkItemStatus) -> &mut Vec<WorkItem> {
        match status {
            WorkItemStatus::Todo => &mut self.todo,
            WorkItemStatus::InProgress => &mut self.in_progress,
            WorkItemStatus::Qa => &mut self.qa,
            WorkItemStatus::Done => &mut self.done,
        }
    }

    /// Total number of items across all columns.
    pub fn len(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.qa.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in WorkItemStatus::ALL {
            assert_eq!(status.as_str().parse::<WorkItemStatus>().unwrap(), status);
        }
        assert!("BLOCKED".parse::<WorkItemStatus>().is_err());
    }

    #[test]
    fn test_priority_rank_order() {
        assert!(WorkItemPriority::Urgent.rank() > WorkItemPriority::High.rank());
        assert!(WorkItemPriority::High.rank() > WorkItemPriority::Medium.rank());
        assert!(WorkItemPriority::Medium.rank() > WorkItemPriority::Low.rank());
    }

    #[test]
    fn test_kind_parse_rejects_unknown() {
        assert!("EPIC".parse::<WorkItemKind>().is_err());
        assert_eq!("TASK".parse::<WorkItemKind>().unwrap(), WorkItemKind::Task);
    }

    #[test]
    fn test_meta_json_round_trip() {
        let meta = WorkItemMeta {
            tags: vec!["bug".to_string(), "login".to_string()],
            estimated_hours: Some(2.0),
            browser: Some("Chrome".to_string()),
            version: None,
            extra: serde_json::Map::new(),
        };

        let text = serde_json::to_string(&meta).unwrap();
        let parsed: WorkItemMeta = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_meta_preserves_unknown_fields() {
        let text = r#"{"tags":["a"],"estimatedHours":2,"reproSteps":"click twice"}"#;
        let parsed: WorkItemMeta = serde_json::from_str(text).unwrap();
        assert_eq!(parsed.tags, vec!["a"]);
        assert_eq!(parsed.estimated_hours, Some(2.0));
        assert_eq!(
            parsed.extra.get("reproSteps").and_then(|v| v.as_str()),
            Some("click twice")
        );
    }

    #[test]
    fn test_update_input_distinguishes_absent_from_null() {
        let json = r#"{"id":"4a1e6f3e-9c2b-4d62-8f0a-5b1d2c3e4f50","description":null}"#;
        let input: UpdateWorkItem = serde_json::from_str(json).unwrap();
        assert_eq!(input.description, Some(None));
        assert_eq!(input.title, None);
        assert_eq!(input.meta, None);
    }
}
