//! Issue-to-issue links and label attachments.
//!
//! Every link caches state on one or both endpoints, and the store has no
//! multi-document transactions. Each operation therefore works from the
//! issue snapshots it is handed: it reads the cached array, edits it, and
//! writes it back. Repeating an operation converges to the same state, but
//! two callers editing the same array concurrently can lose one update.
//!
//! | Operation | Writes |
//! |---|---|
//! | [`add_relation`](RelationshipGraph::add_relation) | `relations` of the source only |
//! | [`add_blocked_by`](RelationshipGraph::add_blocked_by) | `blockedBy` of the blocked issue |
//! | [`set_parent`](RelationshipGraph::set_parent) | child `parents`, parent `childInfo` + `subIssues`, old parent |
//! | [`attach_label`](RelationshipGraph::attach_label) | tag element (when new), tag reference |

use crate::backend::{Attachment, Attributes, Backend, DocUpdate, FindOptions, Query};
use crate::domain::{
    ChildInfo, Issue, LABELS_COLLECTION, OTHER_TAG_CATEGORY, ParentInfo, RelatedDoc,
    SUB_ISSUES_COLLECTION, TagElement, TagReference, class, space,
};
use crate::error::{Error, Result};
use crate::id_generation::label_color;
use crate::identifier::IssueIdentifier;
use serde_json::json;

/// Outcome of looking an issue up by its `PROJECT-NUMBER` identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The issue exists.
    Found(Box<Issue>),
    /// The identifier is well-formed but no issue carries it.
    NotFound(IssueIdentifier),
    /// The input is not a `PROJECT-NUMBER` identifier.
    Malformed(String),
}

impl Resolution {
    /// The issue, or the matching error carrying the offending identifier.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` for [`Resolution::NotFound`] and `Error::Validation`
    /// for [`Resolution::Malformed`].
    pub fn into_result(self) -> Result<Issue> {
        match self {
            Self::Found(issue) => Ok(*issue),
            Self::NotFound(identifier) => Err(Error::not_found("Issue", identifier.to_string())),
            Self::Malformed(input) => Err(IssueIdentifier::parse(&input)
                .err()
                .unwrap_or_else(|| Error::validation("issue identifier", input, "Malformed"))),
        }
    }
}

/// Result of an operation that creates a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The link was written.
    Linked,
    /// The link was already present; nothing new was added.
    AlreadyLinked,
}

/// Result of an operation that removes a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    /// The link was removed.
    Unlinked,
    /// There was nothing to remove.
    NotLinked,
}

/// Maintains relationship state between issues.
pub struct RelationshipGraph<'a> {
    backend: &'a dyn Backend,
}

impl<'a> RelationshipGraph<'a> {
    /// Operate against `backend`.
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Look an issue up by identifier.
    ///
    /// # Errors
    ///
    /// Only backend failures are errors; a missing or malformed identifier
    /// is reported through the [`Resolution`].
    pub async fn resolve(&self, input: &str) -> Result<Resolution> {
        let Ok(identifier) = IssueIdentifier::parse(input.trim()) else {
            return Ok(Resolution::Malformed(input.to_string()));
        };

        let query = Query::new().eq("identifier", identifier.to_string());
        let found: Option<Issue> = self
            .backend
            .find_one_as(class::ISSUE, &query, &FindOptions::new())
            .await?;

        Ok(match found {
            Some(issue) => Resolution::Found(Box::new(issue)),
            None => Resolution::NotFound(identifier),
        })
    }

    /// [`resolve`](Self::resolve), collapsed into a `Result`.
    ///
    /// # Errors
    ///
    /// See [`Resolution::into_result`].
    pub async fn require(&self, input: &str) -> Result<Issue> {
        self.resolve(input).await?.into_result()
    }

    /// Record that `issue` relates to `other`.
    ///
    /// Only `issue`'s `relations` are written. Call again with the arguments
    /// swapped to make the link visible from `other`.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for a self-link; backend failures otherwise.
    pub async fn add_relation(&self, issue: &Issue, other: &Issue) -> Result<LinkOutcome> {
        reject_self_link("related issue", issue, other)?;
        self.append_related(issue, "relations", &issue.relations, other)
            .await
    }

    /// Record that `issue` is blocked by `blocker`.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for a self-link; backend failures otherwise.
    pub async fn add_blocked_by(&self, issue: &Issue, blocker: &Issue) -> Result<LinkOutcome> {
        reject_self_link("blocking issue", issue, blocker)?;
        self.append_related(issue, "blockedBy", &issue.blocked_by, blocker)
            .await
    }

    async fn append_related(
        &self,
        issue: &Issue,
        field: &str,
        current: &[RelatedDoc],
        target: &Issue,
    ) -> Result<LinkOutcome> {
        if current.iter().any(|related| related.id == target.id) {
            return Ok(LinkOutcome::AlreadyLinked);
        }

        let mut updated = current.to_vec();
        updated.push(target.as_related());
        let update = DocUpdate::new().set_serialized(field, &updated)?;
        self.backend
            .update_doc(class::ISSUE, &issue.space, &issue.id, &update, false)
            .await?;

        tracing::debug!(
            issue = %issue.identifier,
            target = %target.identifier,
            field,
            "Linked issues"
        );
        Ok(LinkOutcome::Linked)
    }

    /// Make `parent` the direct parent of `child`.
    ///
    /// The child's `parents` become the parent's summary followed by the
    /// parent's own chain. The parent's `childInfo` entry for the child is
    /// replaced or appended and `subIssues` is rewritten as its length. A
    /// previous, different parent loses its entry for the child.
    ///
    /// # Errors
    ///
    /// `Error::Validation` when `child` is `parent` or an ancestor of it;
    /// backend failures otherwise.
    pub async fn set_parent(&self, child: &Issue, parent: &Issue) -> Result<LinkOutcome> {
        reject_self_link("parent issue", child, parent)?;
        if parent.parents.iter().any(|p| p.parent_id == child.id) {
            return Err(Error::validation(
                "parent issue",
                &parent.identifier,
                format!("{} is an ancestor of it", child.identifier),
            ));
        }

        let previous = child.parents.first().map(|p| p.parent_id.clone());
        let already_linked = previous.as_deref() == Some(parent.id.as_str())
            && parent.child_info.iter().any(|c| c.child_id == child.id);

        if let Some(previous) = previous.filter(|id| *id != parent.id) {
            self.detach_from_parent(child, &previous).await?;
        }

        let mut chain = Vec::with_capacity(parent.parents.len() + 1);
        chain.push(ParentInfo {
            parent_id: parent.id.clone(),
            identifier: parent.identifier.clone(),
            parent_title: parent.title.clone(),
            space: parent.space.clone(),
        });
        chain.extend(parent.parents.iter().cloned());

        let attachment = Attachment::new(&parent.id, class::ISSUE, SUB_ISSUES_COLLECTION);
        let child_update = DocUpdate::new().set_serialized("parents", &chain)?;
        self.backend
            .update_collection(class::ISSUE, &child.space, &child.id, &attachment, &child_update)
            .await?;

        let entry = ChildInfo {
            child_id: child.id.clone(),
            estimation: child.estimation,
            reported_time: child.reported_time,
        };
        let mut child_info = parent.child_info.clone();
        match child_info.iter_mut().find(|c| c.child_id == child.id) {
            Some(existing) => *existing = entry,
            None => child_info.push(entry),
        }
        self.write_child_info(parent, &child_info).await?;

        tracing::debug!(
            child = %child.identifier,
            parent = %parent.identifier,
            sub_issues = child_info.len(),
            "Set parent"
        );
        Ok(if already_linked {
            LinkOutcome::AlreadyLinked
        } else {
            LinkOutcome::Linked
        })
    }

    /// Drop `child` from its direct parent's `childInfo`.
    ///
    /// Used before a child is deleted so the parent's `subIssues` stays in
    /// step with its cached children.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    pub async fn detach_child(&self, child: &Issue) -> Result<UnlinkOutcome> {
        let Some(parent) = child.parents.first() else {
            return Ok(UnlinkOutcome::NotLinked);
        };
        self.detach_from_parent(child, &parent.parent_id).await?;
        Ok(UnlinkOutcome::Unlinked)
    }

    async fn detach_from_parent(&self, child: &Issue, parent_id: &str) -> Result<()> {
        let query = Query::new().eq("_id", parent_id);
        let previous: Option<Issue> = self
            .backend
            .find_one_as(class::ISSUE, &query, &FindOptions::new())
            .await?;
        let Some(previous) = previous else {
            tracing::warn!(child = %child.identifier, parent_id, "Previous parent no longer exists");
            return Ok(());
        };

        let remaining: Vec<ChildInfo> = previous
            .child_info
            .iter()
            .filter(|c| c.child_id != child.id)
            .cloned()
            .collect();
        self.write_child_info(&previous, &remaining).await
    }

    /// Persist `childInfo` and the matching `subIssues` count together.
    async fn write_child_info(&self, parent: &Issue, child_info: &[ChildInfo]) -> Result<()> {
        let update = DocUpdate::new()
            .set_serialized("childInfo", &child_info)?
            .set("subIssues", child_info.len());
        self.backend
            .update_doc(class::ISSUE, &parent.space, &parent.id, &update, false)
            .await?;
        Ok(())
    }

    /// Find an issue label by name.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    pub async fn find_label(&self, name: &str) -> Result<Option<TagElement>> {
        let query = Query::new()
            .eq("title", name)
            .eq("targetClass", class::ISSUE);
        self.backend
            .find_one_as(class::TAG_ELEMENT, &query, &FindOptions::new())
            .await
    }

    /// Find an issue label by name, creating it if absent.
    ///
    /// Returns the label and whether it was created. Without an explicit
    /// color a new label gets a palette color derived from its name.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    pub async fn ensure_label(&self, name: &str, color: Option<u32>) -> Result<(TagElement, bool)> {
        if let Some(existing) = self.find_label(name).await? {
            return Ok((existing, false));
        }

        let color = color.unwrap_or_else(|| label_color(name));
        let mut attributes = Attributes::new();
        attributes.insert("title".to_string(), json!(name));
        attributes.insert("description".to_string(), json!(""));
        attributes.insert("targetClass".to_string(), json!(class::ISSUE));
        attributes.insert("color".to_string(), json!(color));
        attributes.insert("category".to_string(), json!(OTHER_TAG_CATEGORY));

        let id = self
            .backend
            .create_doc(class::TAG_ELEMENT, space::WORKSPACE, attributes, None)
            .await?;
        tracing::debug!(label = name, id = %id, "Created label");

        Ok((
            TagElement {
                id,
                space: space::WORKSPACE.to_string(),
                title: name.to_string(),
                target_class: class::ISSUE.to_string(),
                color: Some(color),
            },
            true,
        ))
    }

    async fn find_reference(&self, issue: &Issue, tag: &TagElement) -> Result<Option<TagReference>> {
        let query = Query::new()
            .eq("attachedTo", issue.id.as_str())
            .eq("tag", tag.id.as_str());
        self.backend
            .find_one_as(class::TAG_REFERENCE, &query, &FindOptions::new())
            .await
    }

    /// Attach the named label to `issue`, creating the label if needed.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    pub async fn attach_label(&self, issue: &Issue, name: &str) -> Result<LinkOutcome> {
        let (tag, _) = self.ensure_label(name, None).await?;
        if self.find_reference(issue, &tag).await?.is_some() {
            return Ok(LinkOutcome::AlreadyLinked);
        }

        let mut attributes = Attributes::new();
        attributes.insert("title".to_string(), json!(tag.title));
        attributes.insert("color".to_string(), json!(tag.color.unwrap_or_default()));
        attributes.insert("tag".to_string(), json!(tag.id));

        let attachment = Attachment::new(&issue.id, class::ISSUE, LABELS_COLLECTION);
        self.backend
            .add_collection(class::TAG_REFERENCE, &issue.space, &attachment, attributes, None)
            .await?;
        tracing::debug!(issue = %issue.identifier, label = name, "Attached label");
        Ok(LinkOutcome::Linked)
    }

    /// Detach the named label from `issue`.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if no label has that name.
    pub async fn detach_label(&self, issue: &Issue, name: &str) -> Result<UnlinkOutcome> {
        let tag = self
            .find_label(name)
            .await?
            .ok_or_else(|| Error::not_found("Label", name))?;
        let Some(reference) = self.find_reference(issue, &tag).await? else {
            return Ok(UnlinkOutcome::NotLinked);
        };

        self.backend
            .remove_doc(class::TAG_REFERENCE, &issue.space, &reference.id)
            .await?;
        tracing::debug!(issue = %issue.identifier, label = name, "Detached label");
        Ok(UnlinkOutcome::Unlinked)
    }
}

fn reject_self_link(field: &'static str, issue: &Issue, target: &Issue) -> Result<()> {
    if issue.id == target.id {
        return Err(Error::validation(
            field,
            &target.identifier,
            "An issue cannot be linked to itself",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryBackend;
    use rstest::rstest;

    async fn seed_issue(backend: &InMemoryBackend, id: &str, number: u64) -> Issue {
        backend
            .seed(
                class::ISSUE,
                json!({
                    "_id": id,
                    "space": "p1",
                    "title": format!("Issue {number}"),
                    "number": number,
                    "identifier": format!("HULY-{number}"),
                    "rank": "0|hzzzzz:",
                }),
            )
            .await
            .unwrap();
        load(backend, id).await
    }

    async fn load(backend: &InMemoryBackend, id: &str) -> Issue {
        serde_json::from_value(backend.get(class::ISSUE, id).await.unwrap()).unwrap()
    }

    #[rstest]
    #[case::unknown("HULY-9", "not found")]
    #[case::malformed("HULY9", "Invalid issue identifier")]
    #[tokio::test]
    async fn test_unresolved_identifiers_carry_input(#[case] input: &str, #[case] kind: &str) {
        let backend = InMemoryBackend::new();
        let graph = RelationshipGraph::new(&backend);

        let message = graph.require(input).await.unwrap_err().to_string();
        assert!(message.contains(kind), "{message}");
        assert!(message.contains(input), "{message}");
    }

    #[tokio::test]
    async fn test_resolve_is_case_insensitive_on_project() {
        let backend = InMemoryBackend::new();
        seed_issue(&backend, "i1", 1).await;
        let graph = RelationshipGraph::new(&backend);

        let resolution = graph.resolve("huly-1").await.unwrap();
        assert!(matches!(resolution, Resolution::Found(issue) if issue.id == "i1"));
    }

    #[tokio::test]
    async fn test_self_links_are_rejected() {
        let backend = InMemoryBackend::new();
        let issue = seed_issue(&backend, "i1", 1).await;
        let graph = RelationshipGraph::new(&backend);

        assert!(matches!(
            graph.add_relation(&issue, &issue).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            graph.add_blocked_by(&issue, &issue).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            graph.set_parent(&issue, &issue).await,
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_blocked_by_is_directed() {
        let backend = InMemoryBackend::new();
        let x = seed_issue(&backend, "x", 1).await;
        let y = seed_issue(&backend, "y", 2).await;
        let graph = RelationshipGraph::new(&backend);

        assert_eq!(graph.add_blocked_by(&x, &y).await.unwrap(), LinkOutcome::Linked);

        let x = load(&backend, "x").await;
        let y = load(&backend, "y").await;
        assert_eq!(x.blocked_by, vec![y.as_related()]);
        assert!(y.blocked_by.is_empty());
    }

    #[tokio::test]
    async fn test_set_parent_rejects_cycles() {
        let backend = InMemoryBackend::new();
        let top = seed_issue(&backend, "top", 1).await;
        let middle = seed_issue(&backend, "middle", 2).await;
        let graph = RelationshipGraph::new(&backend);

        graph.set_parent(&middle, &top).await.unwrap();
        let middle = load(&backend, "middle").await;
        let top = load(&backend, "top").await;

        let err = graph.set_parent(&top, &middle).await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "parent issue", .. }));
    }

    #[tokio::test]
    async fn test_parent_chain_is_inherited() {
        let backend = InMemoryBackend::new();
        let top = seed_issue(&backend, "top", 1).await;
        let middle = seed_issue(&backend, "middle", 2).await;
        let leaf = seed_issue(&backend, "leaf", 3).await;
        let graph = RelationshipGraph::new(&backend);

        graph.set_parent(&middle, &top).await.unwrap();
        let middle = load(&backend, "middle").await;
        graph.set_parent(&leaf, &middle).await.unwrap();

        let leaf = load(&backend, "leaf").await;
        let chain: Vec<_> = leaf.parents.iter().map(|p| p.identifier.as_str()).collect();
        assert_eq!(chain, vec!["HULY-2", "HULY-1"]);
    }

    #[tokio::test]
    async fn test_detach_child_clears_parent_entry() {
        let backend = InMemoryBackend::new();
        let parent = seed_issue(&backend, "parent", 1).await;
        let child = seed_issue(&backend, "child", 2).await;
        let graph = RelationshipGraph::new(&backend);

        assert_eq!(graph.detach_child(&child).await.unwrap(), UnlinkOutcome::NotLinked);

        graph.set_parent(&child, &parent).await.unwrap();
        let child = load(&backend, "child").await;
        assert_eq!(graph.detach_child(&child).await.unwrap(), UnlinkOutcome::Unlinked);

        let parent = load(&backend, "parent").await;
        assert!(parent.child_info.is_empty());
        assert_eq!(parent.sub_issues, 0);
    }

    #[tokio::test]
    async fn test_label_color_defaults_to_palette() {
        let backend = InMemoryBackend::new();
        let graph = RelationshipGraph::new(&backend);

        let (tag, created) = graph.ensure_label("bug", None).await.unwrap();
        assert!(created);
        assert_eq!(tag.color, Some(label_color("bug")));

        let (again, created) = graph.ensure_label("bug", Some(1)).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, tag.id);
    }

    #[tokio::test]
    async fn test_detach_unknown_label_is_not_found() {
        let backend = InMemoryBackend::new();
        let issue = seed_issue(&backend, "i1", 1).await;
        let graph = RelationshipGraph::new(&backend);

        let err = graph.detach_label(&issue, "nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Label", .. }));
    }
}
