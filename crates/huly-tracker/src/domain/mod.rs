//! Domain types for the Huly tracker.
//!
//! These mirror the platform's document shapes (`_id`, `_class`, `space` and
//! camelCase attributes) so they deserialize straight from backend results.
//! Only the attributes this crate reads or writes are modelled; everything
//! else on a document is ignored on read and left untouched on write.

pub mod codec;

pub use codec::{EnumCodec, MilestoneStatus, Priority};

use serde::{Deserialize, Serialize};

/// Well-known class identifiers.
pub mod class {
    /// Tracker project.
    pub const PROJECT: &str = "tracker:class:Project";
    /// Tracker issue.
    pub const ISSUE: &str = "tracker:class:Issue";
    /// Tracker milestone.
    pub const MILESTONE: &str = "tracker:class:Milestone";
    /// Issue workflow status.
    pub const ISSUE_STATUS: &str = "tracker:class:IssueStatus";
    /// Label definition.
    pub const TAG_ELEMENT: &str = "tags:class:TagElement";
    /// Label attachment.
    pub const TAG_REFERENCE: &str = "tags:class:TagReference";
    /// Contact person.
    pub const PERSON: &str = "contact:class:Person";
    /// Contact channel (email, phone, ...).
    pub const CHANNEL: &str = "contact:class:Channel";
    /// Task type (Issue, Epic, Bug, ...).
    pub const TASK_TYPE: &str = "task:class:TaskType";
}

/// Well-known space identifiers.
pub mod space {
    /// The space that holds space documents such as projects.
    pub const SPACE: &str = "core:space:Space";
    /// Workspace-wide space.
    pub const WORKSPACE: &str = "core:space:Workspace";
}

/// Tracker task type used for newly created issues.
pub const ISSUE_TASK_TYPE: &str = "tracker:taskTypes:Issue";

/// Tag category for labels created by this server.
pub const OTHER_TAG_CATEGORY: &str = "tracker:category:Other";

/// Collection name for issues attached to a project.
pub const ISSUES_COLLECTION: &str = "issues";

/// Collection name for sub-issues attached to a parent issue.
pub const SUB_ISSUES_COLLECTION: &str = "subIssues";

/// Collection name for labels attached to an issue.
pub const LABELS_COLLECTION: &str = "labels";

/// A tracker project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Document class.
    #[serde(rename = "_class", default)]
    pub class: String,

    /// Short unique code, e.g. "HULY".
    pub identifier: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,

    /// Last issued issue number.
    #[serde(default)]
    pub sequence: u64,

    /// Status assigned to newly created issues.
    #[serde(default)]
    pub default_issue_status: Option<String>,
}

/// Reference to another document by id and class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedDoc {
    /// Referenced document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Referenced document class.
    #[serde(rename = "_class")]
    pub class: String,
}

/// Cached summary of a parent issue, stored on the child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentInfo {
    /// Parent issue id.
    pub parent_id: String,

    /// Parent external identifier, e.g. "HULY-1".
    pub identifier: String,

    /// Parent title at the time the link was made.
    pub parent_title: String,

    /// Project the parent belongs to.
    pub space: String,
}

/// Cached summary of a child issue, stored on the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildInfo {
    /// Child issue id.
    pub child_id: String,

    /// Child estimation snapshot.
    #[serde(default)]
    pub estimation: f64,

    /// Child reported time snapshot.
    #[serde(default)]
    pub reported_time: f64,
}

/// A tracker issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Document class.
    #[serde(rename = "_class", default)]
    pub class: String,

    /// Owning project id.
    pub space: String,

    /// Title.
    #[serde(default)]
    pub title: String,

    /// Markup reference for the description, if any.
    #[serde(default)]
    pub description: Option<String>,

    /// Workflow status id.
    #[serde(default)]
    pub status: Option<String>,

    /// Issue number within the project.
    #[serde(default)]
    pub number: u64,

    /// External identifier, `"{project}-{number}"`.
    #[serde(default)]
    pub identifier: String,

    /// Priority.
    #[serde(default)]
    pub priority: Priority,

    /// Assigned person id.
    #[serde(default)]
    pub assignee: Option<String>,

    /// Milestone id.
    #[serde(default)]
    pub milestone: Option<String>,

    /// Ordering key within the project.
    #[serde(default)]
    pub rank: String,

    /// Due date in epoch milliseconds.
    #[serde(default)]
    pub due_date: Option<i64>,

    /// Estimation in hours.
    #[serde(default)]
    pub estimation: f64,

    /// Reported time in hours.
    #[serde(default)]
    pub reported_time: f64,

    /// Generic relations (one-sided, see `RelationshipGraph::add_relation`).
    #[serde(default)]
    pub relations: Vec<RelatedDoc>,

    /// Issues this issue is blocked by.
    #[serde(default)]
    pub blocked_by: Vec<RelatedDoc>,

    /// Parent chain, nearest parent first.
    #[serde(default)]
    pub parents: Vec<ParentInfo>,

    /// Cached child summaries.
    #[serde(default)]
    pub child_info: Vec<ChildInfo>,

    /// Number of children; kept equal to `child_info.len()`.
    #[serde(default)]
    pub sub_issues: u64,

    /// Task type id.
    #[serde(default)]
    pub kind: Option<String>,

    /// Last modification time in epoch milliseconds.
    #[serde(default)]
    pub modified_on: i64,
}

impl Issue {
    /// This issue as a relation target.
    #[must_use]
    pub fn as_related(&self) -> RelatedDoc {
        RelatedDoc {
            id: self.id.clone(),
            class: if self.class.is_empty() {
                class::ISSUE.to_string()
            } else {
                self.class.clone()
            },
        }
    }
}

/// A project milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Owning project id.
    pub space: String,

    /// Label, unique within the project.
    pub label: String,

    /// Description.
    #[serde(default)]
    pub description: Option<String>,

    /// Status.
    #[serde(default)]
    pub status: MilestoneStatus,

    /// Target date in epoch milliseconds.
    #[serde(default)]
    pub target_date: Option<i64>,
}

/// A label definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagElement {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Space holding the label.
    #[serde(default)]
    pub space: String,

    /// Label name.
    pub title: String,

    /// Class of documents this label applies to.
    #[serde(default)]
    pub target_class: String,

    /// Color as a palette index or packed RGB integer.
    #[serde(default)]
    pub color: Option<u32>,
}

/// Attachment of a label to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagReference {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Space holding the attachment.
    #[serde(default)]
    pub space: String,

    /// Attached label id.
    pub tag: String,

    /// Document the label is attached to.
    pub attached_to: String,
}

/// A contact person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Document class.
    #[serde(rename = "_class", default)]
    pub class: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// City.
    #[serde(default)]
    pub city: Option<String>,
}

/// A contact channel belonging to a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Person the channel belongs to.
    #[serde(default)]
    pub attached_to: String,

    /// Channel provider id (email, telegram, ...).
    #[serde(default)]
    pub provider: String,

    /// Channel value.
    #[serde(default)]
    pub value: String,
}

/// An issue workflow status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStatus {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Status category id.
    #[serde(default)]
    pub category: Option<String>,
}

/// A task type (Issue, Epic, Bug, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskType {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Class the task type extends.
    #[serde(default)]
    pub of_class: Option<String>,

    /// Class the task type produces.
    #[serde(default)]
    pub target_class: Option<String>,

    /// Descriptor id.
    #[serde(default)]
    pub descriptor: Option<String>,
}

impl TaskType {
    /// Whether this task type produces tracker issues.
    #[must_use]
    pub fn applies_to_issues(&self) -> bool {
        self.of_class.as_deref() == Some(class::ISSUE)
            || self.target_class.as_deref() == Some(class::ISSUE)
            || self
                .descriptor
                .as_deref()
                .is_some_and(|d| d.contains("tracker"))
    }

    /// Display name, falling back to the last segment of the id.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.rsplit(':').next().unwrap_or(&self.id).to_string(),
        }
    }
}
