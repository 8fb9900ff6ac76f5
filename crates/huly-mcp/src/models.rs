//! MCP request and response models.
//!
//! Request types are deserialized from tool arguments; their field names and
//! descriptions become the tools' input schemas. Response types are the
//! structured payloads returned next to each tool's text summary.

use chrono::{DateTime, NaiveDate, SecondsFormat};
use huly_tracker::domain::{
    EnumCodec, Issue, IssueStatus, Milestone, Person, Project, TagElement, TaskType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================
// Request Types
// ============================================================

/// Parameters for `list_issues`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListIssuesParams {
    /// Project identifier.
    #[schemars(description = "Project identifier (e.g. HULY)")]
    pub project: String,

    /// Maximum number of issues to return.
    #[schemars(description = "Result limit, default 20")]
    pub limit: Option<usize>,

    /// Status id to filter by.
    #[schemars(description = "Status filter")]
    pub status: Option<String>,
}

/// Parameters for tools that address one issue.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IssueParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,

    /// Issue identifier.
    #[schemars(description = "Issue identifier (e.g. HULY-123)")]
    pub identifier: String,
}

/// Parameters for `create_issue`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateIssueParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,

    /// Issue title.
    #[schemars(description = "Issue title")]
    pub title: String,

    /// Markdown description.
    #[schemars(description = "Issue description (Markdown supported)")]
    pub description: Option<String>,

    /// Priority name.
    #[schemars(description = "Priority (urgent/high/medium/low/none)")]
    pub priority: Option<String>,

    /// Assignee person id.
    #[schemars(description = "Assignee ID")]
    pub assignee: Option<String>,
}

/// Parameters for `update_issue`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateIssueParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,

    /// Issue identifier.
    #[schemars(description = "Issue identifier")]
    pub identifier: String,

    /// New title.
    #[schemars(description = "New title")]
    pub title: Option<String>,

    /// New markdown description.
    #[schemars(description = "New description (Markdown supported)")]
    pub description: Option<String>,

    /// New status id.
    #[schemars(description = "New status ID")]
    pub status: Option<String>,

    /// New priority name.
    #[schemars(description = "New priority")]
    pub priority: Option<String>,

    /// New assignee person id.
    #[schemars(description = "New assignee ID")]
    pub assignee: Option<String>,
}

/// Parameters for `set_assignee`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetAssigneeParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,

    /// Issue identifier.
    #[schemars(description = "Issue identifier")]
    pub identifier: String,

    /// Assignee person id; `null` unassigns.
    #[schemars(description = "Assignee ID (null to unassign)")]
    pub assignee: Option<String>,
}

/// Parameters for `set_milestone`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetMilestoneParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,

    /// Issue identifier.
    #[schemars(description = "Issue identifier")]
    pub identifier: String,

    /// Milestone id.
    #[schemars(description = "Milestone ID")]
    pub milestone: String,
}

/// Parameters for tools scoped to a project.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProjectParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,
}

/// Parameters for tools that address one milestone.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MilestoneParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,

    /// Milestone label.
    #[schemars(description = "Milestone name")]
    pub label: String,
}

/// Parameters for `create_milestone`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMilestoneParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,

    /// Milestone label.
    #[schemars(description = "Milestone name")]
    pub label: String,

    /// Target date.
    #[schemars(description = "Target date (ISO 8601 format), default two weeks from now")]
    pub target_date: Option<String>,

    /// Status name.
    #[schemars(description = "Status (Planned/InProgress/Completed/Canceled)")]
    pub status: Option<String>,
}

/// Parameters for `add_label` and `remove_label`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IssueLabelParams {
    /// Project identifier.
    #[schemars(description = "Project identifier")]
    pub project: String,

    /// Issue identifier.
    #[schemars(description = "Issue identifier")]
    pub identifier: String,

    /// Label name.
    #[schemars(description = "Label name")]
    pub label: String,
}

/// Parameters for `create_label`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateLabelParams {
    /// Label name.
    #[schemars(description = "Label name")]
    pub name: String,

    /// Packed RGB color.
    #[schemars(description = "Label color (hexadecimal number, e.g. 0xFF6B6B)")]
    pub color: Option<u32>,
}

/// Parameters for `delete_label`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LabelParams {
    /// Label name.
    #[schemars(description = "Label name")]
    pub name: String,
}

/// Parameters for `add_relation`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddRelationParams {
    /// Project identifier.
    #[schemars(description = "Project identifier; issues are resolved by identifier alone")]
    pub project: String,

    /// Issue that receives the relation.
    #[schemars(description = "Issue identifier")]
    pub identifier: String,

    /// Related issue.
    #[schemars(description = "Related issue identifier")]
    pub related_to_identifier: String,
}

/// Parameters for `add_blocked_by`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddBlockedByParams {
    /// Project identifier.
    #[schemars(description = "Project identifier; issues are resolved by identifier alone")]
    pub project: String,

    /// Blocked issue.
    #[schemars(description = "Blocked issue identifier")]
    pub identifier: String,

    /// Blocking issue.
    #[schemars(description = "Blocking issue identifier")]
    pub blocked_by_identifier: String,
}

/// Parameters for `set_parent`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetParentParams {
    /// Project identifier.
    #[schemars(description = "Project identifier; issues are resolved by identifier alone")]
    pub project: String,

    /// Child issue.
    #[schemars(description = "Child issue identifier")]
    pub identifier: String,

    /// Parent issue.
    #[schemars(description = "Parent issue identifier")]
    pub parent_identifier: String,
}

/// Parameters for `list_persons`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListPersonsParams {
    /// Maximum number of contacts to return.
    #[schemars(description = "Result limit, default 50")]
    pub limit: Option<usize>,
}

/// Parameters for `get_person`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetPersonParams {
    /// Name or part of a name.
    #[schemars(description = "Contact name")]
    pub name: String,
}

/// Parameters for `get_project`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetProjectParams {
    /// Project identifier.
    #[schemars(description = "Project identifier (e.g. HULY)")]
    pub identifier: String,
}

// ============================================================
// Response Types
// ============================================================

/// Generic acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SuccessResponse {
    /// Always `true`; failures are reported as error results.
    pub success: bool,
}

impl SuccessResponse {
    /// The acknowledgement payload.
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Issue row in `list_issues`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IssueSummary {
    /// Document id.
    pub id: String,
    /// External identifier.
    pub identifier: String,
    /// Title.
    pub title: String,
    /// Status id.
    pub status: String,
    /// Priority name.
    pub priority: String,
    /// Assignee person id.
    pub assignee: Option<String>,
}

impl From<&Issue> for IssueSummary {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            identifier: issue.identifier.clone(),
            title: issue.title.clone(),
            status: issue.status.clone().unwrap_or_default(),
            priority: issue.priority.as_str().to_string(),
            assignee: issue.assignee.clone(),
        }
    }
}

/// Response from `list_issues`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IssueListResponse {
    /// Matching issues, most recently modified first.
    pub issues: Vec<IssueSummary>,
}

/// Full issue view for `get_issue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueDetail {
    /// Document id.
    pub id: String,
    /// External identifier.
    pub identifier: String,
    /// Title.
    pub title: String,
    /// Description as markdown.
    pub description: Option<String>,
    /// Status id.
    pub status: String,
    /// Priority name.
    pub priority: String,
    /// Assignee person id.
    pub assignee: Option<String>,
    /// Milestone id.
    pub milestone: Option<String>,
    /// Due date (RFC 3339).
    pub due_date: Option<String>,
}

/// Response from `get_issue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IssueDetailResponse {
    /// The issue.
    pub issue: IssueDetail,
}

/// Identity of a newly created issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreatedIssue {
    /// Document id.
    pub id: String,
    /// External identifier, e.g. `HULY-1`.
    pub identifier: String,
    /// Title.
    pub title: String,
}

/// Response from `create_issue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateIssueResponse {
    /// The created issue.
    pub issue: CreatedIssue,
}

/// Milestone row in `list_milestones`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneSummary {
    /// Document id.
    pub id: String,
    /// Label.
    pub label: String,
    /// Status name.
    pub status: String,
    /// Target date (RFC 3339).
    pub target_date: Option<String>,
}

impl From<&Milestone> for MilestoneSummary {
    fn from(milestone: &Milestone) -> Self {
        Self {
            id: milestone.id.clone(),
            label: milestone.label.clone(),
            status: milestone.status.as_str().to_string(),
            target_date: milestone.target_date.and_then(format_timestamp),
        }
    }
}

/// Response from `list_milestones`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MilestoneListResponse {
    /// Milestones of the project.
    pub milestones: Vec<MilestoneSummary>,
}

/// Milestone view for `get_milestone`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneDetail {
    /// Document id.
    pub id: String,
    /// Label.
    pub label: String,
    /// Description, empty when unset.
    pub description: String,
    /// Status name.
    pub status: String,
    /// Target date (RFC 3339).
    pub target_date: Option<String>,
    /// Number of project issues in this milestone.
    pub issue_count: usize,
}

/// Response from `get_milestone`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MilestoneDetailResponse {
    /// The milestone.
    pub milestone: MilestoneDetail,
}

/// Identity of a newly created milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreatedMilestone {
    /// Document id.
    pub id: String,
    /// Label.
    pub label: String,
}

/// Response from `create_milestone`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateMilestoneResponse {
    /// The created milestone.
    pub milestone: CreatedMilestone,
}

/// Label row in `list_labels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LabelSummary {
    /// Document id.
    pub id: String,
    /// Label name.
    pub name: String,
    /// Color as `#rrggbb`.
    pub color: Option<String>,
}

impl From<&TagElement> for LabelSummary {
    fn from(tag: &TagElement) -> Self {
        Self {
            id: tag.id.clone(),
            name: tag.title.clone(),
            color: tag.color.filter(|c| *c != 0).map(format_color),
        }
    }
}

/// Response from `list_labels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LabelListResponse {
    /// Issue labels in the workspace.
    pub labels: Vec<LabelSummary>,
}

/// Identity of a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LabelRef {
    /// Document id.
    pub id: String,
    /// Label name.
    pub name: String,
}

/// Response from `create_label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CreateLabelResponse {
    /// The created or already existing label.
    pub label: LabelRef,
}

/// Task type row in `list_task_types`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskTypeSummary {
    /// Document id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Descriptor id, empty when unset.
    pub description: String,
}

impl From<&TaskType> for TaskTypeSummary {
    fn from(task_type: &TaskType) -> Self {
        Self {
            id: task_type.id.clone(),
            name: task_type.display_name(),
            description: task_type.descriptor.clone().unwrap_or_default(),
        }
    }
}

/// Response from `list_task_types`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskTypeListResponse {
    /// Task types that produce issues.
    pub task_types: Vec<TaskTypeSummary>,
}

/// Status row in `list_statuses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusSummary {
    /// Document id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category id, empty when unset.
    pub category: String,
}

impl From<&IssueStatus> for StatusSummary {
    fn from(status: &IssueStatus) -> Self {
        Self {
            id: status.id.clone(),
            name: status.name.clone(),
            category: status.category.clone().unwrap_or_default(),
        }
    }
}

/// Response from `list_statuses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusListResponse {
    /// Issue statuses in the workspace.
    pub statuses: Vec<StatusSummary>,
}

/// Contact row in `list_persons`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonSummary {
    /// Document id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// City.
    pub city: Option<String>,
}

impl From<&Person> for PersonSummary {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id.clone(),
            name: person.name.clone().unwrap_or_else(|| "unknown".to_string()),
            city: person.city.clone(),
        }
    }
}

/// Response from `list_persons`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonListResponse {
    /// Contacts.
    pub persons: Vec<PersonSummary>,
}

/// A contact channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChannelSummary {
    /// Provider id.
    #[serde(rename = "type")]
    pub kind: String,
    /// Channel value (address, handle, number).
    pub value: String,
}

/// Contact view for `get_person`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonDetail {
    /// Document id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// City.
    pub city: Option<String>,
    /// Contact channels.
    pub channels: Vec<ChannelSummary>,
}

/// Response from `get_person`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PersonDetailResponse {
    /// The contact.
    pub person: PersonDetail,
}

/// Project view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectSummary {
    /// Document id.
    pub id: String,
    /// Short code, e.g. `HULY`.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            identifier: project.identifier.clone(),
            name: project.name.clone(),
            description: project.description.clone(),
        }
    }
}

/// Response from `list_projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectListResponse {
    /// Projects in the workspace.
    pub projects: Vec<ProjectSummary>,
}

/// Response from `get_project`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectDetailResponse {
    /// The project.
    pub project: ProjectSummary,
}

// ============================================================
// Conversions
// ============================================================

/// Render a packed RGB integer as `#rrggbb`.
#[must_use]
pub fn format_color(color: u32) -> String {
    format!("#{color:06x}")
}

/// Render epoch milliseconds as RFC 3339 (UTC, millisecond precision).
#[must_use]
pub fn format_timestamp(millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(millis).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Parse a date argument as RFC 3339 or `YYYY-MM-DD` (midnight UTC).
///
/// # Errors
///
/// Returns a validation error carrying the input when neither form parses.
pub fn parse_date(field: &'static str, input: &str) -> huly_tracker::Result<i64> {
    let trimmed = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.timestamp_millis());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
        .ok_or_else(|| {
            huly_tracker::Error::validation(field, input, "Expected an RFC 3339 timestamp or YYYY-MM-DD")
        })
}
