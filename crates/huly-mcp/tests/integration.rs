//! Integration tests for huly-mcp tools.
//!
//! These tests drive the tools against the in-memory backend through a real
//! `ConnectionManager` to verify end-to-end behavior including:
//! - Issue numbering, ranking and listing
//! - Parent/child, relation and label links
//! - Milestone lifecycle
//! - Error reporting for unknown, foreign or malformed identifiers

use huly_mcp::error::Error;
use huly_mcp::models::{
    AddBlockedByParams, AddRelationParams, CreateIssueParams, CreateLabelParams,
    CreateMilestoneParams, IssueLabelParams, ListIssuesParams, SetMilestoneParams,
    SetParentParams, UpdateIssueParams,
};
use huly_mcp::tools::Tools;
use huly_tracker::backend::in_memory::{InMemoryBackend, InMemoryConnector};
use huly_tracker::domain::{Issue, class};
use huly_tracker::{ConnectionManager, Credentials, Error as TrackerError, HulyConfig, Rank};
use rstest::{fixture, rstest};
use serde_json::json;
use std::sync::Arc;

mod helpers {
    use super::*;

    pub const PROJECT_ID: &str = "proj-huly";

    pub struct Harness {
        pub tools: Tools,
        pub backend: InMemoryBackend,
        pub connector: Arc<InMemoryConnector>,
    }

    pub fn config() -> HulyConfig {
        HulyConfig::new(
            "https://huly.test",
            "ws",
            Some(Credentials::Token("token".to_string())),
        )
        .expect("valid config")
    }

    /// Build tools over a workspace with one project, a contact and some
    /// workflow metadata.
    pub async fn harness() -> Harness {
        let backend = InMemoryBackend::new();
        let seed = |class: &'static str, doc: serde_json::Value| {
            let backend = backend.clone();
            async move { backend.seed(class, doc).await.expect("seed") }
        };

        seed(
            class::PROJECT,
            json!({
                "_id": PROJECT_ID,
                "_class": class::PROJECT,
                "identifier": "HULY",
                "name": "Huly",
                "description": "Platform work",
                "sequence": 0,
                "defaultIssueStatus": "tracker:status:Backlog",
            }),
        )
        .await;
        seed(
            class::PROJECT,
            json!({ "_id": "proj-ops", "identifier": "OPS", "name": "Operations", "sequence": 0 }),
        )
        .await;
        seed(
            class::PERSON,
            json!({ "_id": "person-ann", "_class": class::PERSON, "name": "Ann Lee", "city": "Oslo" }),
        )
        .await;
        seed(
            class::CHANNEL,
            json!({
                "_id": "channel-ann",
                "attachedTo": "person-ann",
                "attachedToClass": class::PERSON,
                "provider": "contact:channelProvider:Email",
                "value": "ann@huly.test",
            }),
        )
        .await;
        seed(
            class::ISSUE_STATUS,
            json!({ "_id": "tracker:status:Backlog", "name": "Backlog", "category": "task:statusCategory:UnStarted" }),
        )
        .await;
        seed(
            class::TASK_TYPE,
            json!({ "_id": "tracker:taskTypes:Issue", "name": "Issue", "ofClass": class::ISSUE }),
        )
        .await;
        seed(
            class::TASK_TYPE,
            json!({ "_id": "recruit:taskTypes:Applicant", "name": "Applicant", "ofClass": "recruit:class:Applicant" }),
        )
        .await;

        let connector = Arc::new(InMemoryConnector::new(backend.clone()));
        let manager = ConnectionManager::new(config(), connector.clone());
        Harness {
            tools: Tools::new(Arc::new(manager)),
            backend,
            connector,
        }
    }

    pub async fn create(tools: &Tools, title: &str) -> String {
        create_in(tools, "HULY", title).await
    }

    pub async fn create_in(tools: &Tools, project: &str, title: &str) -> String {
        tools
            .create_issue(CreateIssueParams {
                project: project.to_string(),
                title: title.to_string(),
                description: None,
                priority: None,
                assignee: None,
            })
            .await
            .expect("create_issue should succeed")
            .payload
            .issue
            .identifier
    }

    pub async fn load(backend: &InMemoryBackend, identifier: &str) -> Issue {
        let number: u64 = identifier
            .rsplit('-')
            .next()
            .and_then(|n| n.parse().ok())
            .expect("numbered identifier");
        let docs = (backend as &dyn huly_tracker::Backend)
            .find_all_as::<Issue>(
                class::ISSUE,
                &huly_tracker::backend::Query::new().eq("number", number),
                &huly_tracker::backend::FindOptions::new(),
            )
            .await
            .expect("query issues");
        docs.into_iter().next().expect("issue exists")
    }

    pub fn set_parent_params(child: &str, parent: &str) -> SetParentParams {
        SetParentParams {
            project: "HULY".to_string(),
            identifier: child.to_string(),
            parent_identifier: parent.to_string(),
        }
    }
}

use helpers::*;

#[fixture]
async fn h() -> Harness {
    harness().await
}

// ============================================================
// Issue lifecycle
// ============================================================

#[rstest]
#[tokio::test]
async fn test_create_issue_numbers_and_ranks_sequentially(#[future] h: Harness) {
    let h = h.await;

    let first = h
        .tools
        .create_issue(CreateIssueParams {
            project: "HULY".to_string(),
            title: "Fix bug".to_string(),
            description: None,
            priority: None,
            assignee: None,
        })
        .await
        .unwrap();
    assert_eq!(first.summary, "Created issue: HULY-1 - Fix bug");
    assert_eq!(first.payload.issue.identifier, "HULY-1");

    let second = create(&h.tools, "Write docs").await;
    assert_eq!(second, "HULY-2");

    let first = load(&h.backend, "HULY-1").await;
    let second = load(&h.backend, "HULY-2").await;
    assert_eq!(first.rank, Rank::initial().as_str());
    assert!(second.rank > first.rank);
    assert_eq!(first.status.as_deref(), Some("tracker:status:Backlog"));
    assert_eq!(first.kind.as_deref(), Some("tracker:taskTypes:Issue"));
    assert_eq!(first.sub_issues, 0);

    let project = h.backend.get(class::PROJECT, PROJECT_ID).await.unwrap();
    assert_eq!(project["sequence"], 2);
    assert_eq!(project["issues"], 2);
}

#[rstest]
#[tokio::test]
async fn test_many_tool_calls_share_one_handshake(#[future] h: Harness) {
    let h = h.await;
    for n in 0..5 {
        create(&h.tools, &format!("Task {n}")).await;
    }
    h.tools.list_projects().await.unwrap();

    assert_eq!(h.connector.handshakes(), 1);
}

#[rstest]
#[tokio::test]
async fn test_get_issue_resolves_description(#[future] h: Harness) {
    let h = h.await;
    h.tools
        .create_issue(CreateIssueParams {
            project: "huly".to_string(),
            title: "Crash on save".to_string(),
            description: Some("Steps:\n1. Save".to_string()),
            priority: Some("URGENT".to_string()),
            assignee: Some("person-ann".to_string()),
        })
        .await
        .unwrap();

    let output = h.tools.get_issue("HULY", "HULY-1").await.unwrap();
    let issue = output.payload.issue;
    assert_eq!(issue.description.as_deref(), Some("Steps:\n1. Save"));
    assert_eq!(issue.priority, "urgent");
    assert_eq!(issue.assignee.as_deref(), Some("person-ann"));
    assert_eq!(issue.due_date, None);
    assert_eq!(
        output.summary,
        "HULY-1: Crash on save\nStatus: tracker:status:Backlog\nPriority: urgent\nAssignee: person-ann"
    );
}

#[rstest]
#[tokio::test]
async fn test_list_issues_filters_and_limits(#[future] h: Harness) {
    let h = h.await;
    for title in ["A", "B", "C"] {
        create(&h.tools, title).await;
    }
    h.tools
        .update_issue(UpdateIssueParams {
            project: "HULY".to_string(),
            identifier: "HULY-2".to_string(),
            title: None,
            description: None,
            status: Some("tracker:status:Done".to_string()),
            priority: None,
            assignee: None,
        })
        .await
        .unwrap();

    let all = h
        .tools
        .list_issues(ListIssuesParams {
            project: "HULY".to_string(),
            limit: Some(2),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(all.payload.issues.len(), 2);
    assert!(all.summary.starts_with("Found 2 issue(s):"));

    let done = h
        .tools
        .list_issues(ListIssuesParams {
            project: "HULY".to_string(),
            limit: None,
            status: Some("tracker:status:Done".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(done.payload.issues.len(), 1);
    assert_eq!(done.payload.issues[0].identifier, "HULY-2");
    assert_eq!(done.payload.issues[0].priority, "medium");
}

#[rstest]
#[tokio::test]
async fn test_update_issue_writes_only_given_fields(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "Original").await;

    let output = h
        .tools
        .update_issue(UpdateIssueParams {
            project: "HULY".to_string(),
            identifier: "HULY-1".to_string(),
            title: None,
            description: Some("New body".to_string()),
            status: None,
            priority: Some("low".to_string()),
            assignee: None,
        })
        .await
        .unwrap();
    assert_eq!(output.summary, "Updated issue: HULY-1");
    assert!(output.payload.success);

    let issue = h.tools.get_issue("HULY", "HULY-1").await.unwrap().payload.issue;
    assert_eq!(issue.title, "Original");
    assert_eq!(issue.priority, "low");
    assert_eq!(issue.description.as_deref(), Some("New body"));
    assert_eq!(issue.status, "tracker:status:Backlog");
}

#[rstest]
#[tokio::test]
async fn test_set_assignee_can_unassign(#[future] h: Harness) {
    use huly_mcp::models::SetAssigneeParams;

    let h = h.await;
    create(&h.tools, "Task").await;
    let params = |assignee: Option<&str>| SetAssigneeParams {
        project: "HULY".to_string(),
        identifier: "HULY-1".to_string(),
        assignee: assignee.map(str::to_string),
    };

    h.tools.set_assignee(params(Some("person-ann"))).await.unwrap();
    assert_eq!(load(&h.backend, "HULY-1").await.assignee.as_deref(), Some("person-ann"));

    let output = h.tools.set_assignee(params(None)).await.unwrap();
    assert_eq!(output.summary, "Set assignee of HULY-1 to unassigned");
    assert_eq!(load(&h.backend, "HULY-1").await.assignee, None);
}

// ============================================================
// Parent/child links
// ============================================================

#[rstest]
#[tokio::test]
async fn test_set_parent_twice_keeps_one_sub_issue(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "Epic").await;
    create(&h.tools, "Task").await;

    let first = h.tools.set_parent(set_parent_params("HULY-2", "HULY-1")).await.unwrap();
    assert_eq!(first.summary, "Set parent issue: HULY-2 is now a child of HULY-1");
    assert_eq!(load(&h.backend, "HULY-1").await.sub_issues, 1);

    let second = h.tools.set_parent(set_parent_params("HULY-2", "HULY-1")).await.unwrap();
    assert_eq!(second.summary, "HULY-2 is already a child of HULY-1");

    let parent = load(&h.backend, "HULY-1").await;
    assert_eq!(parent.sub_issues, 1);
    assert_eq!(parent.child_info.len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_delete_issue_detaches_it_from_its_parent(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "Epic").await;
    create(&h.tools, "Task").await;
    create(&h.tools, "Other task").await;
    h.tools.set_parent(set_parent_params("HULY-2", "HULY-1")).await.unwrap();
    h.tools.set_parent(set_parent_params("HULY-3", "HULY-1")).await.unwrap();

    let output = h.tools.delete_issue("HULY", "HULY-2").await.unwrap();
    assert_eq!(output.summary, "Deleted issue: HULY-2");

    let parent = load(&h.backend, "HULY-1").await;
    let remaining = load(&h.backend, "HULY-3").await;
    assert_eq!(parent.sub_issues, 1);
    assert_eq!(parent.child_info.len(), 1);
    assert_eq!(parent.child_info[0].child_id, remaining.id);
    assert_eq!(h.backend.count(class::ISSUE).await, 2);

    let err = h.tools.get_issue("HULY", "HULY-2").await.unwrap_err();
    assert!(matches!(err, Error::Tracker(TrackerError::NotFound { entity: "Issue", .. })));
}

#[rstest]
#[tokio::test]
async fn test_parent_may_live_in_another_project(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "Task").await;
    create_in(&h.tools, "OPS", "Rollout").await;

    h.tools.set_parent(set_parent_params("HULY-1", "OPS-1")).await.unwrap();
    let child = load(&h.backend, "HULY-1").await;
    assert_eq!(child.parents[0].identifier, "OPS-1");
}

// ============================================================
// Relations
// ============================================================

#[rstest]
#[tokio::test]
async fn test_relations_and_blockers_are_idempotent(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "A").await;
    create(&h.tools, "B").await;

    let relate = || AddRelationParams {
        project: "HULY".to_string(),
        identifier: "HULY-1".to_string(),
        related_to_identifier: "HULY-2".to_string(),
    };
    assert_eq!(
        h.tools.add_relation(relate()).await.unwrap().summary,
        "Added relation: HULY-1 -> HULY-2"
    );
    assert_eq!(
        h.tools.add_relation(relate()).await.unwrap().summary,
        "Issues already related"
    );

    let block = || AddBlockedByParams {
        project: "HULY".to_string(),
        identifier: "HULY-1".to_string(),
        blocked_by_identifier: "HULY-2".to_string(),
    };
    assert_eq!(
        h.tools.add_blocked_by(block()).await.unwrap().summary,
        "Added dependency: HULY-1 blocked by HULY-2"
    );
    assert_eq!(
        h.tools.add_blocked_by(block()).await.unwrap().summary,
        "HULY-1 already blocked by HULY-2"
    );

    let a = load(&h.backend, "HULY-1").await;
    assert_eq!(a.relations.len(), 1);
    assert_eq!(a.blocked_by.len(), 1);
}

#[rstest]
#[tokio::test]
async fn test_link_tools_resolve_issues_by_identifier_alone(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "Epic").await;
    create_in(&h.tools, "OPS", "Rollout").await;

    // The project argument names neither issue's project.
    let output = h
        .tools
        .set_parent(SetParentParams {
            project: "HULY".to_string(),
            identifier: "OPS-1".to_string(),
            parent_identifier: "HULY-1".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(output.summary, "Set parent issue: OPS-1 is now a child of HULY-1");

    h.tools
        .add_relation(AddRelationParams {
            project: "UNKNOWN".to_string(),
            identifier: "OPS-1".to_string(),
            related_to_identifier: "HULY-1".to_string(),
        })
        .await
        .unwrap();
    h.tools
        .add_blocked_by(AddBlockedByParams {
            project: "HULY".to_string(),
            identifier: "OPS-1".to_string(),
            blocked_by_identifier: "HULY-1".to_string(),
        })
        .await
        .unwrap();

    let child = load(&h.backend, "OPS-1").await;
    assert_eq!(child.parents[0].identifier, "HULY-1");
    assert_eq!(child.relations.len(), 1);
    assert_eq!(child.blocked_by.len(), 1);
    assert_eq!(load(&h.backend, "HULY-1").await.sub_issues, 1);
}

#[rstest]
#[tokio::test]
async fn test_link_tools_report_unknown_issue(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "Epic").await;

    let err = h
        .tools
        .set_parent(set_parent_params("HULY-9", "HULY-1"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Issue not found: HULY-9");
}

#[rstest]
#[tokio::test]
async fn test_issue_from_another_project_is_not_found(#[future] h: Harness) {
    let h = h.await;
    create_in(&h.tools, "OPS", "Rollout").await;

    let err = h.tools.get_issue("HULY", "OPS-1").await.unwrap_err();
    match err {
        Error::Tracker(TrackerError::NotFound { entity, key }) => {
            assert_eq!(entity, "Issue");
            assert_eq!(key, "OPS-1");
        }
        other => panic!("Expected not-found error, got {other:?}"),
    }

    let err = h.tools.delete_issue("HULY", "OPS-1").await.unwrap_err();
    assert!(matches!(err, Error::Tracker(TrackerError::NotFound { entity: "Issue", .. })));
    assert_eq!(h.backend.count(class::ISSUE).await, 1);
}

#[rstest]
#[tokio::test]
async fn test_malformed_identifier_is_validated(#[future] h: Harness) {
    let h = h.await;
    let err = h.tools.get_issue("HULY", "HULY1").await.unwrap_err();
    match err {
        Error::Tracker(TrackerError::Validation { field, value, .. }) => {
            assert_eq!(field, "issue identifier");
            assert_eq!(value, "HULY1");
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn test_unknown_project_is_reported_by_code(#[future] h: Harness) {
    let h = h.await;
    let err = h.tools.list_milestones("nope").await.unwrap_err();
    assert_eq!(err.to_string(), "Project not found: NOPE");
}

// ============================================================
// Milestones
// ============================================================

#[rstest]
#[tokio::test]
async fn test_milestone_lifecycle(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "Task").await;

    let created = h
        .tools
        .create_milestone(CreateMilestoneParams {
            project: "HULY".to_string(),
            label: "v1.0".to_string(),
            target_date: Some("2025-03-01".to_string()),
            status: Some("in_progress".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(created.summary, "Created milestone: v1.0");

    let listed = h.tools.list_milestones("HULY").await.unwrap();
    assert_eq!(listed.payload.milestones[0].status, "InProgress");
    assert_eq!(
        listed.payload.milestones[0].target_date.as_deref(),
        Some("2025-03-01T00:00:00.000Z")
    );

    h.tools
        .set_milestone(SetMilestoneParams {
            project: "HULY".to_string(),
            identifier: "HULY-1".to_string(),
            milestone: "v1.0".to_string(),
        })
        .await
        .unwrap();
    let detail = h.tools.get_milestone("HULY", "v1.0").await.unwrap();
    assert_eq!(detail.payload.milestone.issue_count, 1);
    assert_eq!(detail.summary, "Milestone: v1.0\nStatus: InProgress\nIssues: 1");

    h.tools.delete_milestone("HULY", "v1.0").await.unwrap();
    assert_eq!(load(&h.backend, "HULY-1").await.milestone, None);
    let err = h.tools.get_milestone("HULY", "v1.0").await.unwrap_err();
    assert!(err.to_string().contains("v1.0"));
}

#[rstest]
#[tokio::test]
async fn test_create_milestone_rejects_unparsable_date(#[future] h: Harness) {
    let h = h.await;
    let err = h
        .tools
        .create_milestone(CreateMilestoneParams {
            project: "HULY".to_string(),
            label: "v2".to_string(),
            target_date: Some("someday".to_string()),
            status: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Tracker(TrackerError::Validation { .. })));
    assert_eq!(h.backend.count(class::MILESTONE).await, 0);
}

// ============================================================
// Labels
// ============================================================

#[rstest]
#[tokio::test]
async fn test_label_lifecycle(#[future] h: Harness) {
    let h = h.await;
    create(&h.tools, "Task").await;

    let created = h
        .tools
        .create_label(CreateLabelParams {
            name: "bug".to_string(),
            color: None,
        })
        .await
        .unwrap();
    assert_eq!(created.summary, "Created label: bug");
    let again = h
        .tools
        .create_label(CreateLabelParams {
            name: "bug".to_string(),
            color: Some(0xFF_00_00),
        })
        .await
        .unwrap();
    assert_eq!(again.summary, "Label \"bug\" already exists");
    assert_eq!(again.payload.label.id, created.payload.label.id);

    let labels = h.tools.list_labels().await.unwrap().payload.labels;
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].color.as_deref(), Some("#4ecdc4"));

    let attach = || IssueLabelParams {
        project: "HULY".to_string(),
        identifier: "HULY-1".to_string(),
        label: "bug".to_string(),
    };
    h.tools.add_label(attach()).await.unwrap();
    let repeat = h.tools.add_label(attach()).await.unwrap();
    assert_eq!(repeat.summary, "Label \"bug\" already exists on issue");
    assert_eq!(h.backend.count(class::TAG_REFERENCE).await, 1);

    h.tools.delete_label("bug").await.unwrap();
    assert_eq!(h.backend.count(class::TAG_ELEMENT).await, 0);
    assert_eq!(h.backend.count(class::TAG_REFERENCE).await, 0);

    let err = h.tools.remove_label(attach()).await.unwrap_err();
    assert!(matches!(err, Error::Tracker(TrackerError::NotFound { entity: "Label", .. })));
}

// ============================================================
// Directory lookups
// ============================================================

#[rstest]
#[tokio::test]
async fn test_get_person_matches_substring_with_channels(#[future] h: Harness) {
    let h = h.await;
    let output = h.tools.get_person("ann").await.unwrap();

    let person = output.payload.person;
    assert_eq!(person.name, "Ann Lee");
    assert_eq!(person.channels.len(), 1);
    assert_eq!(person.channels[0].value, "ann@huly.test");
    assert!(output.summary.contains("- ann@huly.test"));

    let err = h.tools.get_person("zed").await.unwrap_err();
    assert_eq!(err.to_string(), "Person not found: zed");
}

#[rstest]
#[tokio::test]
async fn test_workspace_metadata(#[future] h: Harness) {
    let h = h.await;

    let task_types = h.tools.list_task_types("HULY").await.unwrap().payload.task_types;
    assert_eq!(task_types.len(), 1);
    assert_eq!(task_types[0].name, "Issue");

    let statuses = h.tools.list_statuses().await.unwrap().payload.statuses;
    assert_eq!(statuses[0].name, "Backlog");

    let project = h.tools.get_project("huly").await.unwrap();
    assert_eq!(project.payload.project.name, "Huly");
    assert_eq!(
        project.summary,
        "Project: HULY\nName: Huly\nDescription: Platform work"
    );
    assert_eq!(h.tools.list_persons(None).await.unwrap().payload.persons.len(), 1);
}

// ============================================================
// Connection
// ============================================================

#[tokio::test]
async fn test_missing_credentials_surface_as_tool_error() {
    let config = HulyConfig {
        credentials: None,
        ..config()
    };
    let connector = Arc::new(InMemoryConnector::new(InMemoryBackend::new()));
    let tools = Tools::new(Arc::new(ConnectionManager::new(config, connector.clone())));

    let err = tools.list_projects().await.unwrap_err();
    assert!(matches!(err, Error::Tracker(TrackerError::Configuration(_))));
    assert_eq!(connector.handshakes(), 0);
}
