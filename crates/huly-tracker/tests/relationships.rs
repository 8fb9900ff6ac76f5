//! Consistency tests for numbering, ranking and issue links.
//!
//! Everything runs against the in-memory backend, which serializes each call
//! per document the same way the platform does.

use huly_tracker::backend::in_memory::InMemoryBackend;
use huly_tracker::Backend as _;
use huly_tracker::backend::{DocUpdate, FindOptions, Query, SortOrder};
use huly_tracker::domain::{Issue, Project, TagReference, class};
use huly_tracker::{LinkOutcome, Rank, RelationshipGraph, SequenceAllocator, UnlinkOutcome};
use rstest::{fixture, rstest};
use serde_json::json;
use std::collections::HashSet;

const PROJECT_ID: &str = "proj-huly";

#[fixture]
fn backend() -> InMemoryBackend {
    InMemoryBackend::new()
}

async fn seed_project(backend: &InMemoryBackend) -> Project {
    backend
        .seed(
            class::PROJECT,
            json!({
                "_id": PROJECT_ID,
                "identifier": "HULY",
                "name": "Huly",
                "sequence": 0,
            }),
        )
        .await
        .expect("seed project");
    serde_json::from_value(backend.get(class::PROJECT, PROJECT_ID).await.expect("project"))
        .expect("project shape")
}

/// Create an issue the way the server does: number, then rank after the last.
async fn create_issue(backend: &InMemoryBackend, project: &Project, title: &str) -> Issue {
    let (number, identifier) = SequenceAllocator::new(backend)
        .next_identifier(project)
        .await
        .expect("allocate number");

    let last = backend
        .find_all(
            class::ISSUE,
            &Query::new().eq("space", PROJECT_ID),
            &FindOptions::new()
                .sort("rank", SortOrder::Descending)
                .limit(1),
        )
        .await
        .expect("find last issue")
        .into_iter()
        .next()
        .and_then(|doc| doc["rank"].as_str().map(|r| Rank::from(r.to_string())));
    let rank = Rank::after(last.as_ref());

    let id = format!("issue-{number}");
    backend
        .seed(
            class::ISSUE,
            json!({
                "_id": id,
                "space": PROJECT_ID,
                "title": title,
                "number": number,
                "identifier": identifier.to_string(),
                "rank": rank.as_str(),
                "subIssues": 0,
                "estimation": number,
            }),
        )
        .await
        .expect("seed issue");
    load(backend, &id).await
}

async fn load(backend: &InMemoryBackend, id: &str) -> Issue {
    serde_json::from_value(backend.get(class::ISSUE, id).await.expect("issue exists"))
        .expect("issue shape")
}

async fn resolve(backend: &InMemoryBackend, identifier: &str) -> Issue {
    RelationshipGraph::new(backend)
        .require(identifier)
        .await
        .expect("issue resolves")
}

#[rstest]
#[tokio::test]
async fn test_first_issues_get_sequential_identifiers_and_ascending_ranks(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;

    let first = create_issue(&backend, &project, "Fix bug").await;
    let second = create_issue(&backend, &project, "Write docs").await;

    assert_eq!(first.identifier, "HULY-1");
    assert_eq!(first.rank, Rank::initial().as_str());
    assert_eq!(second.identifier, "HULY-2");
    assert!(second.rank > first.rank);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocations_never_repeat_a_number() {
    let backend = InMemoryBackend::new();
    let project = seed_project(&backend).await;

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let backend = backend.clone();
            let project = project.clone();
            tokio::spawn(async move {
                SequenceAllocator::new(&backend)
                    .next_number(&project)
                    .await
                    .expect("allocate")
            })
        })
        .collect();

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.expect("task should not panic"));
    }
    let distinct: HashSet<u64> = numbers.iter().copied().collect();
    assert_eq!(distinct.len(), 64);
    assert_eq!(distinct, (1..=64).collect::<HashSet<u64>>());
}

#[rstest]
#[tokio::test]
async fn test_set_parent_twice_keeps_a_single_child_entry(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    create_issue(&backend, &project, "Epic").await;
    create_issue(&backend, &project, "Task").await;

    let graph = RelationshipGraph::new(&backend);
    let child = resolve(&backend, "HULY-2").await;
    let parent = resolve(&backend, "HULY-1").await;
    assert_eq!(graph.set_parent(&child, &parent).await.unwrap(), LinkOutcome::Linked);

    let parent = resolve(&backend, "HULY-1").await;
    assert_eq!(parent.sub_issues, 1);
    assert_eq!(parent.child_info.len(), 1);

    let child = resolve(&backend, "HULY-2").await;
    assert_eq!(
        graph.set_parent(&child, &parent).await.unwrap(),
        LinkOutcome::AlreadyLinked
    );

    let parent = resolve(&backend, "HULY-1").await;
    assert_eq!(parent.sub_issues, 1);
    assert_eq!(parent.child_info.len(), 1);
    assert_eq!(parent.child_info[0].child_id, child.id);

    let child = resolve(&backend, "HULY-2").await;
    assert_eq!(child.parents.len(), 1);
    assert_eq!(child.parents[0].identifier, "HULY-1");
    assert_eq!(child.parents[0].parent_title, "Epic");
}

#[rstest]
#[tokio::test]
async fn test_sub_issue_count_tracks_child_info(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    create_issue(&backend, &project, "Epic").await;
    for n in 0..5 {
        create_issue(&backend, &project, &format!("Task {n}")).await;
    }

    let graph = RelationshipGraph::new(&backend);
    for number in [2, 3, 4, 3, 5, 6, 2] {
        let child = resolve(&backend, &format!("HULY-{number}")).await;
        let parent = resolve(&backend, "HULY-1").await;
        graph.set_parent(&child, &parent).await.unwrap();

        let parent = resolve(&backend, "HULY-1").await;
        let ids: HashSet<_> = parent.child_info.iter().map(|c| c.child_id.as_str()).collect();
        assert_eq!(ids.len(), parent.child_info.len());
        assert_eq!(parent.sub_issues, parent.child_info.len() as u64);
    }

    assert_eq!(resolve(&backend, "HULY-1").await.sub_issues, 5);
}

#[rstest]
#[tokio::test]
async fn test_reparenting_moves_the_child_between_parents(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    create_issue(&backend, &project, "Old epic").await;
    create_issue(&backend, &project, "New epic").await;
    create_issue(&backend, &project, "Task").await;

    let graph = RelationshipGraph::new(&backend);
    let child = resolve(&backend, "HULY-3").await;
    graph
        .set_parent(&child, &resolve(&backend, "HULY-1").await)
        .await
        .unwrap();

    let child = resolve(&backend, "HULY-3").await;
    graph
        .set_parent(&child, &resolve(&backend, "HULY-2").await)
        .await
        .unwrap();

    let old = resolve(&backend, "HULY-1").await;
    let new = resolve(&backend, "HULY-2").await;
    assert_eq!((old.sub_issues, old.child_info.len()), (0, 0));
    assert_eq!((new.sub_issues, new.child_info.len()), (1, 1));
    assert_eq!(resolve(&backend, "HULY-3").await.parents[0].identifier, "HULY-2");
}

#[rstest]
#[tokio::test]
async fn test_set_parent_refreshes_the_child_snapshot(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    create_issue(&backend, &project, "Epic").await;
    create_issue(&backend, &project, "Task").await;
    let graph = RelationshipGraph::new(&backend);

    let child = resolve(&backend, "HULY-2").await;
    graph
        .set_parent(&child, &resolve(&backend, "HULY-1").await)
        .await
        .unwrap();

    backend
        .patch(&child.id, &DocUpdate::new().set("estimation", 13))
        .await
        .unwrap();
    let child = resolve(&backend, "HULY-2").await;
    graph
        .set_parent(&child, &resolve(&backend, "HULY-1").await)
        .await
        .unwrap();

    let parent = resolve(&backend, "HULY-1").await;
    assert_eq!(parent.child_info.len(), 1);
    assert!((parent.child_info[0].estimation - 13.0).abs() < f64::EPSILON);
}

#[rstest]
#[tokio::test]
async fn test_relations_are_idempotent_and_one_sided(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    create_issue(&backend, &project, "A").await;
    create_issue(&backend, &project, "B").await;
    let graph = RelationshipGraph::new(&backend);

    let a = resolve(&backend, "HULY-1").await;
    let b = resolve(&backend, "HULY-2").await;
    assert_eq!(graph.add_relation(&a, &b).await.unwrap(), LinkOutcome::Linked);

    let a = resolve(&backend, "HULY-1").await;
    assert_eq!(
        graph.add_relation(&a, &b).await.unwrap(),
        LinkOutcome::AlreadyLinked
    );

    let a = resolve(&backend, "HULY-1").await;
    let b = resolve(&backend, "HULY-2").await;
    assert_eq!(a.relations.iter().filter(|r| r.id == b.id).count(), 1);
    assert!(b.relations.is_empty(), "the reverse side is written only on request");

    graph.add_relation(&b, &a).await.unwrap();
    let b = resolve(&backend, "HULY-2").await;
    assert_eq!(b.relations, vec![a.as_related()]);
}

#[rstest]
#[tokio::test]
async fn test_blocked_by_is_idempotent(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    create_issue(&backend, &project, "X").await;
    create_issue(&backend, &project, "Y").await;
    let graph = RelationshipGraph::new(&backend);

    for _ in 0..2 {
        let x = resolve(&backend, "HULY-1").await;
        let y = resolve(&backend, "HULY-2").await;
        graph.add_blocked_by(&x, &y).await.unwrap();
    }

    let x = resolve(&backend, "HULY-1").await;
    assert_eq!(x.blocked_by.len(), 1);
    assert_eq!(x.blocked_by[0].class, class::ISSUE);
}

#[rstest]
#[tokio::test]
async fn test_labels_attach_once_and_detach_idempotently(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    let issue = create_issue(&backend, &project, "Labelled").await;
    let graph = RelationshipGraph::new(&backend);

    assert_eq!(graph.attach_label(&issue, "bug").await.unwrap(), LinkOutcome::Linked);
    assert_eq!(
        graph.attach_label(&issue, "bug").await.unwrap(),
        LinkOutcome::AlreadyLinked
    );
    assert_eq!(backend.count(class::TAG_ELEMENT).await, 1);

    let references: Vec<TagReference> = (&backend as &dyn huly_tracker::Backend)
        .find_all_as(
            class::TAG_REFERENCE,
            &Query::new().eq("attachedTo", issue.id.as_str()),
            &FindOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(references.len(), 1);
    assert_eq!(load(&backend, &issue.id).await.sub_issues, 0);

    assert_eq!(
        graph.detach_label(&issue, "bug").await.unwrap(),
        UnlinkOutcome::Unlinked
    );
    assert_eq!(
        graph.detach_label(&issue, "bug").await.unwrap(),
        UnlinkOutcome::NotLinked
    );
    assert_eq!(backend.count(class::TAG_REFERENCE).await, 0);
}

/// Two appends from the same stale "last rank" collide. Callers that need
/// unique ranks must re-read the last rank after allocating a number.
#[rstest]
#[tokio::test]
async fn test_stale_rank_snapshots_collide(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    let last = create_issue(&backend, &project, "Last").await;
    let snapshot = Rank::from(last.rank.clone());

    let a = Rank::after(Some(&snapshot));
    let b = Rank::after(Some(&snapshot));
    assert_eq!(a, b);
}

/// Two `set_parent` calls working from the same parent snapshot each write
/// a `childInfo` that lacks the other's child; the later write wins. The
/// count stays consistent with the surviving list.
#[rstest]
#[tokio::test]
async fn test_concurrent_set_parent_from_one_snapshot_loses_a_child(backend: InMemoryBackend) {
    let project = seed_project(&backend).await;
    create_issue(&backend, &project, "Epic").await;
    create_issue(&backend, &project, "Task A").await;
    create_issue(&backend, &project, "Task B").await;
    let graph = RelationshipGraph::new(&backend);

    let stale_parent = resolve(&backend, "HULY-1").await;
    let a = resolve(&backend, "HULY-2").await;
    let b = resolve(&backend, "HULY-3").await;
    graph.set_parent(&a, &stale_parent).await.unwrap();
    graph.set_parent(&b, &stale_parent).await.unwrap();

    let parent = resolve(&backend, "HULY-1").await;
    assert_eq!(parent.child_info.len(), 1);
    assert_eq!(parent.child_info[0].child_id, b.id);
    assert_eq!(parent.sub_issues, 1);
}
