//! Label tools: the workspace's issue labels and their attachment to issues.

use super::{ToolOutput, Tools, find_project, find_project_issue};
use crate::error::Result;
use crate::models::{
    CreateLabelParams, CreateLabelResponse, IssueLabelParams, LabelListResponse, LabelRef,
    LabelSummary, SuccessResponse,
};
use huly_tracker::backend::{FindOptions, Query};
use huly_tracker::domain::{TagElement, TagReference, class};
use huly_tracker::{Error as TrackerError, LinkOutcome, RelationshipGraph, UnlinkOutcome};

/// Color for labels created through `create_label` without one.
pub const DEFAULT_LABEL_COLOR: u32 = 0x4E_CD_C4;

impl Tools {
    /// List the labels that apply to issues.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn list_labels(&self) -> Result<ToolOutput<LabelListResponse>> {
        let backend = self.backend().await?;
        let labels: Vec<TagElement> = backend
            .find_all_as(
                class::TAG_ELEMENT,
                &Query::new().eq("targetClass", class::ISSUE),
                &FindOptions::new(),
            )
            .await?;

        let lines: Vec<String> = labels.iter().map(|l| format!("- {}", l.title)).collect();
        Ok(ToolOutput::new(
            format!("Found {} label(s):\n{}", labels.len(), lines.join("\n")),
            LabelListResponse {
                labels: labels.iter().map(LabelSummary::from).collect(),
            },
        ))
    }

    /// Create a label, or return the existing one with that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn create_label(&self, params: CreateLabelParams) -> Result<ToolOutput<CreateLabelResponse>> {
        let backend = self.backend().await?;
        let color = params.color.filter(|c| *c != 0).unwrap_or(DEFAULT_LABEL_COLOR);
        let (label, created) = RelationshipGraph::new(backend.as_ref())
            .ensure_label(&params.name, Some(color))
            .await?;

        let summary = if created {
            format!("Created label: {}", params.name)
        } else {
            format!("Label \"{}\" already exists", params.name)
        };
        Ok(ToolOutput::new(
            summary,
            CreateLabelResponse {
                label: LabelRef {
                    id: label.id,
                    name: params.name,
                },
            },
        ))
    }

    /// Delete a label along with its attachments.
    ///
    /// # Errors
    ///
    /// Returns an error if no label has that name.
    pub async fn delete_label(&self, name: &str) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let label = RelationshipGraph::new(backend.as_ref())
            .find_label(name)
            .await?
            .ok_or_else(|| TrackerError::not_found("Label", name))?;

        let references: Vec<TagReference> = backend
            .find_all_as(
                class::TAG_REFERENCE,
                &Query::new().eq("tag", label.id.as_str()),
                &FindOptions::new(),
            )
            .await?;
        for reference in &references {
            backend
                .remove_doc(class::TAG_REFERENCE, &reference.space, &reference.id)
                .await?;
        }
        backend
            .remove_doc(class::TAG_ELEMENT, &label.space, &label.id)
            .await?;
        tracing::info!(label = name, detached = references.len(), "Deleted label");

        Ok(ToolOutput::new(
            format!("Deleted label: {name}"),
            SuccessResponse::ok(),
        ))
    }

    /// Attach a label to an issue, creating the label if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or issue does not exist.
    pub async fn add_label(&self, params: IssueLabelParams) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), &params.project).await?;
        let issue = find_project_issue(backend.as_ref(), &project, &params.identifier).await?;

        let outcome = RelationshipGraph::new(backend.as_ref())
            .attach_label(&issue, &params.label)
            .await?;
        let summary = match outcome {
            LinkOutcome::Linked => format!("Added label \"{}\" to {}", params.label, issue.identifier),
            LinkOutcome::AlreadyLinked => format!("Label \"{}\" already exists on issue", params.label),
        };
        Ok(ToolOutput::new(summary, SuccessResponse::ok()))
    }

    /// Detach a label from an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the project, issue or label does not exist.
    pub async fn remove_label(&self, params: IssueLabelParams) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), &params.project).await?;
        let issue = find_project_issue(backend.as_ref(), &project, &params.identifier).await?;

        let outcome = RelationshipGraph::new(backend.as_ref())
            .detach_label(&issue, &params.label)
            .await?;
        let summary = match outcome {
            UnlinkOutcome::Unlinked => {
                format!("Removed label \"{}\" from {}", params.label, issue.identifier)
            }
            UnlinkOutcome::NotLinked => {
                format!("Label \"{}\" is not on {}", params.label, issue.identifier)
            }
        };
        Ok(ToolOutput::new(summary, SuccessResponse::ok()))
    }
}
