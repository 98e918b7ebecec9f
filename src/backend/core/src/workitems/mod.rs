//! Work items: tickets and tasks, their closed vocabularies, and the
//! actor-facing operations over them.

pub mod actions;
pub mod types;

pub use actions::WorkItemService;
pub use types::{
    Actor, CreateWorkItem, KanbanBoard, Timed, UpdateWorkItem, WorkItem, WorkItemFilters,
    WorkItemId, WorkItemKind, WorkItemMeta, WorkItemPriority, WorkItemStatus,
};
