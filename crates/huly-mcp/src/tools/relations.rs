//! Relationship tools: generic relations, blocking links and parents.
//!
//! Both sides are resolved by their `PROJECT-NUMBER` identifier alone, so a
//! link may cross projects. The `project` argument is not consulted.

use super::{ToolOutput, Tools};
use crate::error::Result;
use crate::models::{AddBlockedByParams, AddRelationParams, SetParentParams, SuccessResponse};
use huly_tracker::{LinkOutcome, RelationshipGraph};

impl Tools {
    /// Record that one issue relates to another.
    ///
    /// Only the first issue's relations are written.
    ///
    /// # Errors
    ///
    /// Returns an error if either issue cannot be resolved or they are the
    /// same issue.
    pub async fn add_relation(&self, params: AddRelationParams) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let graph = RelationshipGraph::new(backend.as_ref());
        let issue = graph.require(&params.identifier).await?;
        let related = graph.require(&params.related_to_identifier).await?;

        let summary = match graph.add_relation(&issue, &related).await? {
            LinkOutcome::Linked => {
                format!("Added relation: {} -> {}", issue.identifier, related.identifier)
            }
            LinkOutcome::AlreadyLinked => "Issues already related".to_string(),
        };
        Ok(ToolOutput::new(summary, SuccessResponse::ok()))
    }

    /// Record that an issue is blocked by another.
    ///
    /// # Errors
    ///
    /// Returns an error if either issue cannot be resolved or they are the
    /// same issue.
    pub async fn add_blocked_by(&self, params: AddBlockedByParams) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let graph = RelationshipGraph::new(backend.as_ref());
        let issue = graph.require(&params.identifier).await?;
        let blocker = graph.require(&params.blocked_by_identifier).await?;

        let summary = match graph.add_blocked_by(&issue, &blocker).await? {
            LinkOutcome::Linked => format!(
                "Added dependency: {} blocked by {}",
                issue.identifier, blocker.identifier
            ),
            LinkOutcome::AlreadyLinked => format!(
                "{} already blocked by {}",
                issue.identifier, blocker.identifier
            ),
        };
        Ok(ToolOutput::new(summary, SuccessResponse::ok()))
    }

    /// Make one issue the parent of another.
    ///
    /// # Errors
    ///
    /// Returns an error if either issue cannot be resolved, they are the same
    /// issue, or the link would create a cycle.
    pub async fn set_parent(&self, params: SetParentParams) -> Result<ToolOutput<SuccessResponse>> {
        let backend = self.backend().await?;
        let graph = RelationshipGraph::new(backend.as_ref());
        let child = graph.require(&params.identifier).await?;
        let parent = graph.require(&params.parent_identifier).await?;

        let summary = match graph.set_parent(&child, &parent).await? {
            LinkOutcome::Linked => format!(
                "Set parent issue: {} is now a child of {}",
                child.identifier, parent.identifier
            ),
            LinkOutcome::AlreadyLinked => format!(
                "{} is already a child of {}",
                child.identifier, parent.identifier
            ),
        };
        Ok(ToolOutput::new(summary, SuccessResponse::ok()))
    }
}
