//! Milestone tools.

use super::{ToolOutput, Tools, find_project};
use crate::error::Result;
use crate::models::{
    CreateMilestoneParams, CreateMilestoneResponse, CreatedMilestone, MilestoneDetail,
    MilestoneDetailResponse, MilestoneListResponse, MilestoneSummary, SuccessResponse,
    format_timestamp, parse_date,
};
use chrono::{Duration, Utc};
use huly_tracker::backend::{Attributes, DocUpdate, FindOptions, Query};
use huly_tracker::domain::{EnumCodec, Issue, Milestone, MilestoneStatus, Project, class};
use huly_tracker::id_generation::generate_id;
use huly_tracker::{Backend, Error as TrackerError};
use serde_json::{Value, json};

/// Days until the target date when `create_milestone` is given none.
const DEFAULT_MILESTONE_DAYS: i64 = 14;

async fn find_milestone(backend: &dyn Backend, project: &Project, label: &str) -> Result<Milestone> {
    let query = Query::new()
        .eq("space", project.id.as_str())
        .eq("label", label);
    let milestone: Option<Milestone> = backend
        .find_one_as(class::MILESTONE, &query, &FindOptions::new())
        .await?;
    Ok(milestone.ok_or_else(|| TrackerError::not_found("Milestone", label))?)
}

async fn milestone_issues(backend: &dyn Backend, project: &Project, milestone: &Milestone) -> Result<Vec<Issue>> {
    let query = Query::new()
        .eq("space", project.id.as_str())
        .eq("milestone", milestone.id.as_str());
    Ok(backend
        .find_all_as(class::ISSUE, &query, &FindOptions::new())
        .await?)
}

impl Tools {
    /// List a project's milestones.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist.
    pub async fn list_milestones(&self, project: &str) -> Result<ToolOutput<MilestoneListResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), project).await?;

        let milestones: Vec<Milestone> = backend
            .find_all_as(
                class::MILESTONE,
                &Query::new().eq("space", project.id.as_str()),
                &FindOptions::new(),
            )
            .await?;

        let lines: Vec<String> = milestones
            .iter()
            .map(|m| format!("- {}: {}", m.label, m.status))
            .collect();
        Ok(ToolOutput::new(
            format!("Found {} milestone(s):\n{}", milestones.len(), lines.join("\n")),
            MilestoneListResponse {
                milestones: milestones.iter().map(MilestoneSummary::from).collect(),
            },
        ))
    }

    /// Show a milestone and how many issues it holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or milestone does not exist.
    pub async fn get_milestone(&self, project: &str, label: &str) -> Result<ToolOutput<MilestoneDetailResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), project).await?;
        let milestone = find_milestone(backend.as_ref(), &project, label).await?;
        let issue_count = milestone_issues(backend.as_ref(), &project, &milestone)
            .await?
            .len();

        Ok(ToolOutput::new(
            format!(
                "Milestone: {}\nStatus: {}\nIssues: {issue_count}",
                milestone.label, milestone.status
            ),
            MilestoneDetailResponse {
                milestone: MilestoneDetail {
                    id: milestone.id,
                    label: milestone.label,
                    description: milestone.description.unwrap_or_default(),
                    status: milestone.status.as_str().to_string(),
                    target_date: milestone.target_date.and_then(format_timestamp),
                    issue_count,
                },
            },
        ))
    }

    /// Create a milestone.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist or the target date
    /// does not parse.
    pub async fn create_milestone(&self, params: CreateMilestoneParams) -> Result<ToolOutput<CreateMilestoneResponse>> {
        let target_date = match params.target_date.as_deref() {
            Some(raw) => parse_date("target date", raw)?,
            None => (Utc::now() + Duration::days(DEFAULT_MILESTONE_DAYS)).timestamp_millis(),
        };
        let status = params
            .status
            .as_deref()
            .map_or(MilestoneStatus::DEFAULT, MilestoneStatus::from_str_or_default);

        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), &params.project).await?;

        let mut attributes = Attributes::new();
        attributes.insert("label".to_string(), json!(params.label));
        attributes.insert("description".to_string(), json!(""));
        attributes.insert("status".to_string(), json!(status.code()));
        attributes.insert("targetDate".to_string(), json!(target_date));
        attributes.insert("comments".to_string(), json!(0));

        let id = backend
            .create_doc(class::MILESTONE, &project.id, attributes, Some(generate_id()))
            .await?;
        tracing::info!(project = %project.identifier, milestone = %params.label, "Created milestone");

        Ok(ToolOutput::new(
            format!("Created milestone: {}", params.label),
            CreateMilestoneResponse {
                milestone: CreatedMilestone {
                    id,
                    label: params.label,
                },
            },
        ))
    }

    /// Delete a milestone and clear it from the issues that referenced it.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or milestone does not exist.
    pub async fn delete_milestone(&self, project: &str, label: &str) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), project).await?;
        let milestone = find_milestone(backend.as_ref(), &project, label).await?;

        let clear = DocUpdate::new().set("milestone", Value::Null);
        for issue in milestone_issues(backend.as_ref(), &project, &milestone).await? {
            backend
                .update_doc(class::ISSUE, &project.id, &issue.id, &clear, false)
                .await?;
        }
        backend
            .remove_doc(class::MILESTONE, &project.id, &milestone.id)
            .await?;
        tracing::info!(project = %project.identifier, milestone = %label, "Deleted milestone");

        Ok(ToolOutput::new(
            format!("Deleted milestone: {label}"),
            SuccessResponse::ok(),
        ))
    }
}
