//! MCP server implementation.
//!
//! This module wires the [`Tools`] into rmcp. Every handler goes through
//! [`respond`], which turns a tool error into an error result carrying
//! `{"error": true, "message": ...}` instead of failing the request, so one
//! bad call never takes the serving loop down.

use crate::error::Error;
use crate::models::{
    AddBlockedByParams, AddRelationParams, CreateIssueParams, CreateLabelParams,
    CreateMilestoneParams, GetPersonParams, GetProjectParams, IssueLabelParams, IssueParams,
    LabelParams, ListIssuesParams, ListPersonsParams, MilestoneParams, ProjectParams,
    SetAssigneeParams, SetMilestoneParams, SetParentParams, UpdateIssueParams,
};
use crate::tools::{ToolOutput, Tools};
use huly_tracker::ConnectionManager;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{
    ErrorData as McpError, ServiceExt, handler::server::ServerHandler, tool, tool_handler,
    tool_router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Convert a tool result into a protocol response.
///
/// Success carries the summary as text and the payload as structured
/// content. Failure carries the error message both ways and sets `isError`.
fn respond<T: Serialize>(tool: &'static str, result: crate::error::Result<ToolOutput<T>>) -> CallToolResult {
    let encoded = result.and_then(|output| {
        serde_json::to_value(&output.payload)
            .map(|payload| (output.summary, payload))
            .map_err(|e| Error::Mcp(format!("Failed to encode {tool} response: {e}")))
    });

    match encoded {
        Ok((summary, payload)) => {
            let mut response = CallToolResult::success(vec![Content::text(summary)]);
            response.structured_content = Some(payload);
            response
        }
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(tool, error = %message, "Tool call failed");
            let mut response = CallToolResult::error(vec![Content::text(message.clone())]);
            response.structured_content = Some(json!({ "error": true, "message": message }));
            response
        }
    }
}

/// The Huly MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct HulyMcpServer {
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl HulyMcpServer {
    /// List issues in a project.
    #[tool(description = "List issues in a project, most recently modified first")]
    async fn list_issues(
        &self,
        Parameters(params): Parameters<ListIssuesParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("list_issues", self.tools.list_issues(params).await))
    }

    /// Get issue details.
    #[tool(description = "Get issue details, including its description as markdown")]
    async fn get_issue(
        &self,
        Parameters(params): Parameters<IssueParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "get_issue",
            self.tools.get_issue(&params.project, &params.identifier).await,
        ))
    }

    /// Create an issue.
    #[tool(description = "Create a new issue in a project")]
    async fn create_issue(
        &self,
        Parameters(params): Parameters<CreateIssueParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("create_issue", self.tools.create_issue(params).await))
    }

    /// Update an issue.
    #[tool(description = "Update an issue's title, description, status, priority or assignee")]
    async fn update_issue(
        &self,
        Parameters(params): Parameters<UpdateIssueParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("update_issue", self.tools.update_issue(params).await))
    }

    /// Delete an issue.
    #[tool(description = "Delete an issue")]
    async fn delete_issue(
        &self,
        Parameters(params): Parameters<IssueParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "delete_issue",
            self.tools
                .delete_issue(&params.project, &params.identifier)
                .await,
        ))
    }

    /// Set or clear an issue's assignee.
    #[tool(description = "Set issue assignee (null to unassign)")]
    async fn set_assignee(
        &self,
        Parameters(params): Parameters<SetAssigneeParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("set_assignee", self.tools.set_assignee(params).await))
    }

    /// Put an issue into a milestone.
    #[tool(description = "Set issue milestone (milestone ID or name)")]
    async fn set_milestone(
        &self,
        Parameters(params): Parameters<SetMilestoneParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("set_milestone", self.tools.set_milestone(params).await))
    }

    /// List all projects.
    #[tool(description = "List all projects")]
    async fn list_projects(&self) -> Result<CallToolResult, McpError> {
        Ok(respond("list_projects", self.tools.list_projects().await))
    }

    /// Get project details.
    #[tool(description = "Get project details")]
    async fn get_project(
        &self,
        Parameters(params): Parameters<GetProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "get_project",
            self.tools.get_project(&params.identifier).await,
        ))
    }

    /// List milestones of a project.
    #[tool(description = "List milestones in a project")]
    async fn list_milestones(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "list_milestones",
            self.tools.list_milestones(&params.project).await,
        ))
    }

    /// Get milestone details.
    #[tool(description = "Get milestone details, including how many issues it holds")]
    async fn get_milestone(
        &self,
        Parameters(params): Parameters<MilestoneParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "get_milestone",
            self.tools
                .get_milestone(&params.project, &params.label)
                .await,
        ))
    }

    /// Create a milestone.
    #[tool(description = "Create a new milestone")]
    async fn create_milestone(
        &self,
        Parameters(params): Parameters<CreateMilestoneParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "create_milestone",
            self.tools.create_milestone(params).await,
        ))
    }

    /// Delete a milestone.
    #[tool(description = "Delete a milestone")]
    async fn delete_milestone(
        &self,
        Parameters(params): Parameters<MilestoneParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "delete_milestone",
            self.tools
                .delete_milestone(&params.project, &params.label)
                .await,
        ))
    }

    /// List contacts.
    #[tool(description = "List all contacts")]
    async fn list_persons(
        &self,
        Parameters(params): Parameters<ListPersonsParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "list_persons",
            self.tools.list_persons(params.limit).await,
        ))
    }

    /// Get contact details.
    #[tool(description = "Get contact details")]
    async fn get_person(
        &self,
        Parameters(params): Parameters<GetPersonParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("get_person", self.tools.get_person(&params.name).await))
    }

    /// Attach a label to an issue.
    #[tool(description = "Add label to issue")]
    async fn add_label(
        &self,
        Parameters(params): Parameters<IssueLabelParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("add_label", self.tools.add_label(params).await))
    }

    /// Detach a label from an issue.
    #[tool(description = "Remove label from issue")]
    async fn remove_label(
        &self,
        Parameters(params): Parameters<IssueLabelParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("remove_label", self.tools.remove_label(params).await))
    }

    /// List labels.
    #[tool(description = "List all available labels")]
    async fn list_labels(&self) -> Result<CallToolResult, McpError> {
        Ok(respond("list_labels", self.tools.list_labels().await))
    }

    /// Create a label.
    #[tool(description = "Create a new label")]
    async fn create_label(
        &self,
        Parameters(params): Parameters<CreateLabelParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("create_label", self.tools.create_label(params).await))
    }

    /// Delete a label.
    #[tool(description = "Delete a label")]
    async fn delete_label(
        &self,
        Parameters(params): Parameters<LabelParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("delete_label", self.tools.delete_label(&params.name).await))
    }

    /// Relate two issues.
    #[tool(description = "Add a relation from an issue to another issue")]
    async fn add_relation(
        &self,
        Parameters(params): Parameters<AddRelationParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("add_relation", self.tools.add_relation(params).await))
    }

    /// Mark an issue as blocked by another.
    #[tool(description = "Mark an issue as blocked by another issue")]
    async fn add_blocked_by(
        &self,
        Parameters(params): Parameters<AddBlockedByParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("add_blocked_by", self.tools.add_blocked_by(params).await))
    }

    /// Set an issue's parent.
    #[tool(description = "Set the parent issue of an issue (make it a sub-issue)")]
    async fn set_parent(
        &self,
        Parameters(params): Parameters<SetParentParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond("set_parent", self.tools.set_parent(params).await))
    }

    /// List task types.
    #[tool(description = "List all task types for a project (e.g. Issue, Epic, Bug)")]
    async fn list_task_types(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(respond(
            "list_task_types",
            self.tools.list_task_types(&params.project).await,
        ))
    }

    /// List issue statuses.
    #[tool(description = "List all available issue statuses in the workspace")]
    async fn list_statuses(&self) -> Result<CallToolResult, McpError> {
        Ok(respond("list_statuses", self.tools.list_statuses().await))
    }
}

impl HulyMcpServer {
    /// Create a server over a connection manager.
    ///
    /// No connection is made until the first tool call.
    #[must_use]
    pub fn new(connection: Arc<ConnectionManager>) -> Self {
        Self {
            tools: Arc::new(Tools::new(connection)),
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the tool implementations.
    #[must_use]
    pub fn tools(&self) -> &Arc<Tools> {
        &self.tools
    }

    /// Serve MCP over stdin/stdout until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to start or stops abnormally.
    pub async fn run(self) -> anyhow::Result<()> {
        use tokio::io::{stdin, stdout};

        let server = self.serve((stdin(), stdout())).await?;
        let quit_reason = server.waiting().await?;
        tracing::info!("MCP server stopped: {:?}", quit_reason);
        Ok(())
    }
}

#[tool_handler]
impl ServerHandler for HulyMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "huly-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Huly issue tracker. Issues are addressed as PROJECT-NUMBER (e.g. HULY-12) together with their project code."
                    .into(),
            ),
        }
    }
}
