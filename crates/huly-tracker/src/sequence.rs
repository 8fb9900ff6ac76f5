//! Per-project issue numbering.
//!
//! Numbers come from the project's `sequence` counter, advanced with the
//! store's atomic `$inc`. The store serializes increments per document, so
//! concurrent allocators (in this process or others) never see the same
//! value. Nothing is read back first.

use crate::backend::{Backend, DocUpdate};
use crate::domain::{Project, class, space};
use crate::error::{Error, Result};
use crate::identifier::IssueIdentifier;
use serde_json::Value;

/// Counter field on a project document.
const SEQUENCE_FIELD: &str = "sequence";

/// Hands out issue numbers for projects.
pub struct SequenceAllocator<'a> {
    backend: &'a dyn Backend,
}

impl<'a> SequenceAllocator<'a> {
    /// Allocate against `backend`.
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Advance the project's counter and return the new value.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the project no longer exists, and
    /// `Error::Backend` if the store does not return the updated counter.
    pub async fn next_number(&self, project: &Project) -> Result<u64> {
        let update = DocUpdate::new().inc(SEQUENCE_FIELD, 1);
        let result = self
            .backend
            .update_doc(class::PROJECT, space::SPACE, &project.id, &update, true)
            .await
            .map_err(|e| match e {
                Error::NotFound { .. } => Error::not_found("Project", &project.identifier),
                other => other,
            })?;

        let number = result
            .object
            .as_ref()
            .and_then(|doc| doc.get(SEQUENCE_FIELD))
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                Error::Backend(format!(
                    "increment of {} sequence returned no counter",
                    project.identifier
                ))
            })?;

        tracing::debug!(project = %project.identifier, number, "Allocated issue number");
        Ok(number)
    }

    /// Allocate a number and format the issue identifier.
    ///
    /// # Errors
    ///
    /// See [`SequenceAllocator::next_number`].
    pub async fn next_identifier(&self, project: &Project) -> Result<(u64, IssueIdentifier)> {
        let number = self.next_number(project).await?;
        Ok((number, IssueIdentifier::new(&project.identifier, number)))
    }
}
