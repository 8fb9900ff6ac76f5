//! Issue tools: listing, reading, creating, updating and deleting issues.

use super::{ToolOutput, Tools, find_project, find_project_issue, project_class};
use crate::error::Result;
use crate::models::{
    CreateIssueParams, CreateIssueResponse, CreatedIssue, IssueDetail, IssueDetailResponse,
    IssueListResponse, IssueSummary, ListIssuesParams, SetAssigneeParams, SetMilestoneParams,
    SuccessResponse, UpdateIssueParams, format_timestamp,
};
use huly_tracker::backend::{Attachment, Attributes, DocUpdate, FindOptions, Query, SortOrder};
use huly_tracker::domain::{
    EnumCodec, ISSUE_TASK_TYPE, ISSUES_COLLECTION, Issue, Milestone, Priority, class,
};
use huly_tracker::id_generation::generate_id;
use huly_tracker::{Error as TrackerError, Rank, RelationshipGraph, SequenceAllocator};
use serde_json::{Value, json};

/// Default page size for `list_issues`.
const DEFAULT_ISSUE_LIMIT: usize = 20;

impl Tools {
    /// List a project's issues, most recently modified first.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist or the backend fails.
    pub async fn list_issues(&self, params: ListIssuesParams) -> Result<ToolOutput<IssueListResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), &params.project).await?;

        let mut query = Query::new().eq("space", project.id.as_str());
        if let Some(status) = params.status.filter(|s| !s.trim().is_empty()) {
            query = query.eq("status", status);
        }
        let options = FindOptions::new()
            .limit(params.limit.unwrap_or(DEFAULT_ISSUE_LIMIT))
            .sort("modifiedOn", SortOrder::Descending);
        let issues: Vec<Issue> = backend.find_all_as(class::ISSUE, &query, &options).await?;

        let lines: Vec<String> = issues
            .iter()
            .map(|i| format!("- {}: {}", i.identifier, i.title))
            .collect();
        Ok(ToolOutput::new(
            format!("Found {} issue(s):\n{}", issues.len(), lines.join("\n")),
            IssueListResponse {
                issues: issues.iter().map(IssueSummary::from).collect(),
            },
        ))
    }

    /// Show one issue with its description resolved to markdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or issue does not exist.
    pub async fn get_issue(&self, project: &str, identifier: &str) -> Result<ToolOutput<IssueDetailResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), project).await?;
        let issue = find_project_issue(backend.as_ref(), &project, identifier).await?;

        let description = match issue.description.as_deref().filter(|d| !d.is_empty()) {
            Some(reference) => Some(
                backend
                    .fetch_markup(class::ISSUE, &issue.id, "description", reference)
                    .await?,
            ),
            None => None,
        };

        let status = issue.status.clone().unwrap_or_default();
        let priority = issue.priority.as_str();
        let summary = format!(
            "{}: {}\nStatus: {}\nPriority: {}\nAssignee: {}",
            issue.identifier,
            issue.title,
            status,
            priority,
            issue.assignee.as_deref().unwrap_or("unassigned"),
        );

        Ok(ToolOutput::new(
            summary,
            IssueDetailResponse {
                issue: IssueDetail {
                    id: issue.id,
                    identifier: issue.identifier,
                    title: issue.title,
                    description,
                    status,
                    priority: priority.to_string(),
                    assignee: issue.assignee,
                    milestone: issue.milestone,
                    due_date: issue.due_date.and_then(format_timestamp),
                },
            },
        ))
    }

    /// Create an issue at the end of the project's list.
    ///
    /// The number comes from the project's atomic sequence; the rank is
    /// placed after the highest-ranked issue in the project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist or the backend fails.
    pub async fn create_issue(&self, params: CreateIssueParams) -> Result<ToolOutput<CreateIssueResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), &params.project).await?;

        let (number, identifier) = SequenceAllocator::new(backend.as_ref())
            .next_identifier(&project)
            .await?;

        let last: Option<Issue> = backend
            .find_one_as(
                class::ISSUE,
                &Query::new().eq("space", project.id.as_str()),
                &FindOptions::new().sort("rank", SortOrder::Descending),
            )
            .await?;
        let rank = Rank::after(last.map(|issue| Rank::from(issue.rank)).as_ref());

        let id = generate_id();
        let description = match params.description.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(markdown) => Some(
                backend
                    .upload_markup(class::ISSUE, &id, "description", markdown)
                    .await?,
            ),
            None => None,
        };
        let priority = params
            .priority
            .as_deref()
            .map_or(Priority::DEFAULT, Priority::from_str_or_default);

        let mut attributes = Attributes::new();
        attributes.insert("title".to_string(), json!(params.title));
        attributes.insert("description".to_string(), json!(description));
        attributes.insert("status".to_string(), json!(project.default_issue_status));
        attributes.insert("number".to_string(), json!(number));
        attributes.insert("kind".to_string(), json!(ISSUE_TASK_TYPE));
        attributes.insert("identifier".to_string(), json!(identifier.to_string()));
        attributes.insert("priority".to_string(), json!(priority.code()));
        attributes.insert("assignee".to_string(), json!(params.assignee));
        attributes.insert("component".to_string(), Value::Null);
        attributes.insert("milestone".to_string(), Value::Null);
        attributes.insert("dueDate".to_string(), Value::Null);
        for counter in ["estimation", "remainingTime", "reportedTime", "reports", "subIssues"] {
            attributes.insert(counter.to_string(), json!(0));
        }
        attributes.insert("parents".to_string(), json!([]));
        attributes.insert("childInfo".to_string(), json!([]));
        attributes.insert("rank".to_string(), json!(rank.as_str()));

        let attachment = Attachment::new(&project.id, project_class(&project), ISSUES_COLLECTION);
        backend
            .add_collection(class::ISSUE, &project.id, &attachment, attributes, Some(id.clone()))
            .await?;
        tracing::info!(issue = %identifier, rank = %rank, "Created issue");

        Ok(ToolOutput::new(
            format!("Created issue: {identifier} - {}", params.title),
            CreateIssueResponse {
                issue: CreatedIssue {
                    id,
                    identifier: identifier.to_string(),
                    title: params.title,
                },
            },
        ))
    }

    /// Update the provided fields of an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or issue does not exist.
    pub async fn update_issue(&self, params: UpdateIssueParams) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), &params.project).await?;
        let issue = find_project_issue(backend.as_ref(), &project, &params.identifier).await?;

        let mut update = DocUpdate::new();
        if let Some(title) = params.title {
            update = update.set("title", title);
        }
        if let Some(status) = params.status {
            update = update.set("status", status);
        }
        if let Some(priority) = params.priority.as_deref() {
            update = update.set("priority", Priority::from_str_or_default(priority).code());
        }
        if let Some(assignee) = params.assignee {
            update = update.set("assignee", assignee);
        }
        if let Some(markdown) = params.description.as_deref() {
            let reference = backend
                .upload_markup(class::ISSUE, &issue.id, "description", markdown)
                .await?;
            update = update.set("description", reference);
        }

        if !update.is_empty() {
            backend
                .update_doc(class::ISSUE, &project.id, &issue.id, &update, false)
                .await?;
        }

        Ok(ToolOutput::new(
            format!("Updated issue: {}", issue.identifier),
            SuccessResponse::ok(),
        ))
    }

    /// Delete an issue and drop it from its parent's children.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or issue does not exist.
    pub async fn delete_issue(&self, project: &str, identifier: &str) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), project).await?;
        let issue = find_project_issue(backend.as_ref(), &project, identifier).await?;

        backend
            .remove_doc(class::ISSUE, &project.id, &issue.id)
            .await?;
        // Rewrites childInfo and subIssues from scratch, so it must follow the
        // removal's own counter decrement.
        RelationshipGraph::new(backend.as_ref())
            .detach_child(&issue)
            .await?;
        tracing::info!(issue = %issue.identifier, "Deleted issue");

        Ok(ToolOutput::new(
            format!("Deleted issue: {}", issue.identifier),
            SuccessResponse::ok(),
        ))
    }

    /// Assign or unassign an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or issue does not exist.
    pub async fn set_assignee(&self, params: SetAssigneeParams) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), &params.project).await?;
        let issue = find_project_issue(backend.as_ref(), &project, &params.identifier).await?;

        let update = DocUpdate::new().set("assignee", params.assignee.clone());
        backend
            .update_doc(class::ISSUE, &project.id, &issue.id, &update, false)
            .await?;

        Ok(ToolOutput::new(
            format!(
                "Set assignee of {} to {}",
                issue.identifier,
                params.assignee.as_deref().unwrap_or("unassigned")
            ),
            SuccessResponse::ok(),
        ))
    }

    /// Put an issue into a milestone, given by id or label.
    ///
    /// # Errors
    ///
    /// Returns an error if the project, issue or milestone does not exist.
    pub async fn set_milestone(&self, params: SetMilestoneParams) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), &params.project).await?;
        let issue = find_project_issue(backend.as_ref(), &project, &params.identifier).await?;

        let mut milestone: Option<Milestone> = None;
        for field in ["_id", "label"] {
            let query = Query::new()
                .eq("space", project.id.as_str())
                .eq(field, params.milestone.as_str());
            milestone = backend
                .find_one_as(class::MILESTONE, &query, &FindOptions::new())
                .await?;
            if milestone.is_some() {
                break;
            }
        }
        let milestone =
            milestone.ok_or_else(|| TrackerError::not_found("Milestone", params.milestone.as_str()))?;

        let update = DocUpdate::new().set("milestone", milestone.id.as_str());
        backend
            .update_doc(class::ISSUE, &project.id, &issue.id, &update, false)
            .await?;

        Ok(ToolOutput::new(
            format!("Set milestone of {} to {}", issue.identifier, milestone.label),
            SuccessResponse::ok(),
        ))
    }
}
