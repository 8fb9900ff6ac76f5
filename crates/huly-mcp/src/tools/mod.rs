//! MCP tool implementations.
//!
//! Every tool acquires the shared backend session from the
//! [`ConnectionManager`], resolves the entities it was given by their human
//! identifiers, and returns a [`ToolOutput`]: a one-paragraph summary plus
//! the structured payload.

mod directory;
mod issues;
mod labels;
mod milestones;
mod relations;

use crate::error::Result;
use huly_tracker::backend::{FindOptions, Query};
use huly_tracker::domain::{Issue, Project, class};
use huly_tracker::{Backend, ConnectionManager, Error as TrackerError, IssueIdentifier, RelationshipGraph};
use std::sync::Arc;

/// Result of a tool call: a human-readable summary and a structured payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput<T> {
    /// Text shown to the user.
    pub summary: String,
    /// Machine-readable result.
    pub payload: T,
}

impl<T> ToolOutput<T> {
    /// Pair a summary with its payload.
    pub fn new(summary: impl Into<String>, payload: T) -> Self {
        Self {
            summary: summary.into(),
            payload,
        }
    }
}

/// Tool implementations for the Huly MCP server.
pub struct Tools {
    connection: Arc<ConnectionManager>,
}

impl Tools {
    /// Create a new `Tools` instance over a connection manager.
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self { connection }
    }

    /// The connection manager the tools draw sessions from.
    #[must_use]
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    async fn backend(&self) -> Result<Arc<dyn Backend>> {
        Ok(self.connection.acquire().await?)
    }
}

/// Find a project by its short code.
async fn find_project(backend: &dyn Backend, code: &str) -> Result<Project> {
    let code = code.trim().to_uppercase();
    let project: Option<Project> = backend
        .find_one_as(
            class::PROJECT,
            &Query::new().eq("identifier", code.as_str()),
            &FindOptions::new(),
        )
        .await?;
    Ok(project.ok_or_else(|| TrackerError::not_found("Project", code))?)
}

/// Resolve an issue within `project`.
///
/// An identifier from another project is not found there.
async fn find_project_issue(backend: &dyn Backend, project: &Project, input: &str) -> Result<Issue> {
    let identifier = IssueIdentifier::parse(input.trim())?;
    if !identifier.project().eq_ignore_ascii_case(&project.identifier) {
        return Err(TrackerError::not_found("Issue", input.trim()).into());
    }
    Ok(RelationshipGraph::new(backend).require(input).await?)
}

/// Class of a project document, defaulting to the tracker project class.
fn project_class(project: &Project) -> &str {
    if project.class.is_empty() {
        class::PROJECT
    } else {
        &project.class
    }
}
