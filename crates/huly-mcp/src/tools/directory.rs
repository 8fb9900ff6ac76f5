//! Read-only lookups: projects, contacts, task types and statuses.

use super::{ToolOutput, Tools, find_project};
use crate::error::Result;
use crate::models::{
    ChannelSummary, PersonDetail, PersonDetailResponse, PersonListResponse, PersonSummary,
    ProjectDetailResponse, ProjectListResponse, ProjectSummary, StatusListResponse,
    StatusSummary, TaskTypeListResponse, TaskTypeSummary,
};
use huly_tracker::backend::{FindOptions, Query};
use huly_tracker::domain::{Channel, IssueStatus, Person, Project, TaskType, class};
use huly_tracker::Error as TrackerError;

/// Default page size for `list_persons`.
const DEFAULT_PERSON_LIMIT: usize = 50;

impl Tools {
    /// List all projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn list_projects(&self) -> Result<ToolOutput<ProjectListResponse>> {
        let backend = self.backend().await?;
        let projects: Vec<Project> = backend
            .find_all_as(class::PROJECT, &Query::new(), &FindOptions::new())
            .await?;

        let lines: Vec<String> = projects
            .iter()
            .map(|p| format!("- {}: {}", p.identifier, p.name))
            .collect();
        Ok(ToolOutput::new(
            format!("Found {} project(s):\n{}", projects.len(), lines.join("\n")),
            ProjectListResponse {
                projects: projects.iter().map(ProjectSummary::from).collect(),
            },
        ))
    }

    /// Show one project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist.
    pub async fn get_project(&self, identifier: &str) -> Result<ToolOutput<ProjectDetailResponse>> {
        let backend = self.backend().await?;
        let project = find_project(backend.as_ref(), identifier).await?;

        Ok(ToolOutput::new(
            format!(
                "Project: {}\nName: {}\nDescription: {}",
                project.identifier,
                project.name,
                project.description.as_deref().unwrap_or("none")
            ),
            ProjectDetailResponse {
                project: ProjectSummary::from(&project),
            },
        ))
    }

    /// List contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn list_persons(&self, limit: Option<usize>) -> Result<ToolOutput<PersonListResponse>> {
        let backend = self.backend().await?;
        let persons: Vec<Person> = backend
            .find_all_as(
                class::PERSON,
                &Query::new(),
                &FindOptions::new().limit(limit.unwrap_or(DEFAULT_PERSON_LIMIT)),
            )
            .await?;

        let persons: Vec<PersonSummary> = persons.iter().map(PersonSummary::from).collect();
        let lines: Vec<String> = persons
            .iter()
            .map(|p| match &p.city {
                Some(city) => format!("- {} ({city})", p.name),
                None => format!("- {}", p.name),
            })
            .collect();
        Ok(ToolOutput::new(
            format!("Found {} contact(s):\n{}", persons.len(), lines.join("\n")),
            PersonListResponse { persons },
        ))
    }

    /// Show the first contact whose name contains `name`, with its channels.
    ///
    /// # Errors
    ///
    /// Returns an error if no contact matches.
    pub async fn get_person(&self, name: &str) -> Result<ToolOutput<PersonDetailResponse>> {
        let backend = self.backend().await?;
        let person: Option<Person> = backend
            .find_one_as(
                class::PERSON,
                &Query::new().like("name", format!("%{}%", name.trim())),
                &FindOptions::new(),
            )
            .await?;
        let person = person.ok_or_else(|| TrackerError::not_found("Person", name))?;

        let person_class = if person.class.is_empty() {
            class::PERSON
        } else {
            person.class.as_str()
        };
        let channels: Vec<Channel> = backend
            .find_all_as(
                class::CHANNEL,
                &Query::new()
                    .eq("attachedTo", person.id.as_str())
                    .eq("attachedToClass", person_class),
                &FindOptions::new(),
            )
            .await?;

        let summary = PersonSummary::from(&person);
        let channel_lines: Vec<String> = channels.iter().map(|c| format!("- {}", c.value)).collect();
        let text = format!(
            "Contact: {}\nCity: {}\nChannels:\n{}",
            summary.name,
            summary.city.as_deref().unwrap_or("unknown"),
            if channel_lines.is_empty() {
                "none".to_string()
            } else {
                channel_lines.join("\n")
            }
        );

        Ok(ToolOutput::new(
            text,
            PersonDetailResponse {
                person: PersonDetail {
                    id: summary.id,
                    name: summary.name,
                    city: summary.city,
                    channels: channels
                        .into_iter()
                        .map(|c| ChannelSummary {
                            kind: c.provider,
                            value: c.value,
                        })
                        .collect(),
                },
            },
        ))
    }

    /// List the task types that produce issues in a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist.
    pub async fn list_task_types(&self, project: &str) -> Result<ToolOutput<TaskTypeListResponse>> {
        let backend = self.backend().await?;
        find_project(backend.as_ref(), project).await?;

        let task_types: Vec<TaskType> = backend
            .find_all_as(class::TASK_TYPE, &Query::new(), &FindOptions::new())
            .await?;
        let task_types: Vec<TaskTypeSummary> = task_types
            .iter()
            .filter(|t| t.applies_to_issues())
            .map(TaskTypeSummary::from)
            .collect();

        let lines: Vec<String> = task_types.iter().map(|t| format!("- {}", t.name)).collect();
        Ok(ToolOutput::new(
            format!("Found {} task type(s):\n{}", task_types.len(), lines.join("\n")),
            TaskTypeListResponse { task_types },
        ))
    }

    /// List issue statuses.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn list_statuses(&self) -> Result<ToolOutput<StatusListResponse>> {
        let backend = self.backend().await?;
        let statuses: Vec<IssueStatus> = backend
            .find_all_as(class::ISSUE_STATUS, &Query::new(), &FindOptions::new())
            .await?;

        let lines: Vec<String> = statuses.iter().map(|s| format!("- {}", s.name)).collect();
        Ok(ToolOutput::new(
            format!("Found {} status(es):\n{}", statuses.len(), lines.join("\n")),
            StatusListResponse {
                statuses: statuses.iter().map(StatusSummary::from).collect(),
            },
        ))
    }
}
