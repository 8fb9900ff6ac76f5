//! MCP server for the Huly issue tracker.
//!
//! This crate exposes a Huly workspace's tracker to AI assistants over the
//! Model Context Protocol.
//!
//! # Architecture
//!
//! The server uses the `rmcp` crate for protocol handling. Tool calls draw
//! the shared backend session from a [`huly_tracker::ConnectionManager`] and
//! go through `huly_tracker` for numbering, ranking and issue links.
//!
//! # Tools
//!
//! ## Issues
//! - `list_issues`, `get_issue`, `create_issue`, `update_issue`, `delete_issue`
//! - `set_assignee`, `set_milestone`
//!
//! ## Projects and contacts
//! - `list_projects`, `get_project`
//! - `list_persons`, `get_person`
//!
//! ## Milestones
//! - `list_milestones`, `get_milestone`, `create_milestone`, `delete_milestone`
//!
//! ## Labels
//! - `list_labels`, `create_label`, `delete_label`
//! - `add_label`, `remove_label`
//!
//! ## Relationships
//! - `add_relation`, `add_blocked_by`, `set_parent`
//!
//! ## Workspace metadata
//! - `list_task_types`, `list_statuses`

pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::HulyMcpServer;
