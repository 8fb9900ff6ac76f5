//! Huly tracker - the mutation-consistency layer behind the Huly MCP server.
//!
//! This crate talks to a Huly workspace's document store and keeps the
//! denormalized tracker state consistent across writes: issue numbering,
//! list ordering, and the links between issues.
//!
//! - [`connection`]: lazy, single-flight acquisition of the backend session
//! - [`sequence`]: collision-free issue numbers via the store's atomic `$inc`
//! - [`rank`]: ordering keys for issue lists
//! - [`relations`]: relations, blocked-by, parent/child and label links
//! - [`domain`]: document shapes and the priority/milestone-status codecs
//! - [`backend`]: the document-store interface with in-memory and REST
//!   implementations

#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod id_generation;
pub mod identifier;
pub mod rank;
pub mod relations;
pub mod sequence;

pub use backend::Backend;
pub use config::{Credentials, HulyConfig};
pub use connection::{ConnectionManager, ConnectionState, Connector};
pub use error::{Error, Result};
pub use identifier::IssueIdentifier;
pub use rank::Rank;
pub use relations::{LinkOutcome, RelationshipGraph, Resolution, UnlinkOutcome};
pub use sequence::SequenceAllocator;
