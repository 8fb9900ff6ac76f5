//! Document-store abstraction.
//!
//! The platform's document store is an external collaborator. This module
//! pins down the subset of its interface the tracker relies on as the
//! object-safe [`Backend`] trait, with two implementations:
//!
//! - **In-memory** ([`in_memory::InMemoryBackend`]): a mutex-guarded map of
//!   JSON documents, used by tests and local experiments
//! - **REST** ([`rest::RestBackend`]): the platform's HTTP API
//!
//! # Atomicity
//!
//! Each call is atomic with respect to the single document it touches. In
//! particular `$inc` in [`DocUpdate`] is applied by the store, never as a
//! client-side read-then-write; it is the only cross-process serialization
//! point the tracker relies on. Nothing spans two calls: a read followed by
//! a write can interleave with other callers.

pub mod in_memory;
pub mod markup;
pub mod rest;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Attribute map of a document.
pub type Attributes = Map<String, Value>;

/// A conjunction of field predicates.
///
/// Serializes to the platform's query document, e.g.
/// `{"space": "p1", "name": {"$like": "%ann%"}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Query(Map<String, Value>);

impl Query {
    /// An empty query matching every document of a class.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`. A `null` value also matches a missing field.
    #[must_use]
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Require `field` to match a `%`-wildcard pattern, case-insensitively.
    #[must_use]
    pub fn like(mut self, field: &str, pattern: impl Into<String>) -> Self {
        self.0
            .insert(field.to_string(), json!({ "$like": pattern.into() }));
        self
    }

    /// Whether no predicate is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(field, predicate)` pairs.
    pub fn predicates(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Sort direction, encoded as the platform's numeric sorting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortOrder {
    /// Numeric encoding used on the wire.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// Limit and sort options for a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Sort keys, most significant first.
    pub sort: Vec<(String, SortOrder)>,
}

impl FindOptions {
    /// Options with neither limit nor sort.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a sort key.
    #[must_use]
    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort.push((field.to_string(), order));
        self
    }

    /// Whether neither limit nor sort is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.sort.is_empty()
    }

    /// The platform's options document, e.g. `{"limit": 20, "sort": {"rank": -1}}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut options = Map::new();
        if let Some(limit) = self.limit {
            options.insert("limit".to_string(), json!(limit));
        }
        if !self.sort.is_empty() {
            let sort: Map<String, Value> = self
                .sort
                .iter()
                .map(|(field, order)| (field.clone(), json!(order.code())))
                .collect();
            options.insert("sort".to_string(), Value::Object(sort));
        }
        Value::Object(options)
    }
}

/// Field writes and atomic increments applied to one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocUpdate {
    set: Attributes,
    inc: Map<String, Value>,
}

impl DocUpdate {
    /// An empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `field` with `value`.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    /// Overwrite `field` with a serializable value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the value cannot be serialized.
    pub fn set_serialized<T: Serialize>(self, field: &str, value: &T) -> Result<Self> {
        Ok(self.set(field, serde_json::to_value(value)?))
    }

    /// Atomically add `amount` to a numeric `field` (missing counts as 0).
    #[must_use]
    pub fn inc(mut self, field: &str, amount: i64) -> Self {
        self.inc.insert(field.to_string(), json!(amount));
        self
    }

    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.inc.is_empty()
    }

    /// Plain field writes.
    #[must_use]
    pub fn fields(&self) -> &Attributes {
        &self.set
    }

    /// Atomic increments.
    #[must_use]
    pub fn increments(&self) -> &Map<String, Value> {
        &self.inc
    }

    /// The platform's operations document: writes plus an `$inc` section.
    #[must_use]
    pub fn to_operations(&self) -> Value {
        let mut operations = self.set.clone();
        if !self.inc.is_empty() {
            operations.insert("$inc".to_string(), Value::Object(self.inc.clone()));
        }
        Value::Object(operations)
    }
}

/// Where a collection-typed document hangs in its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Owner document id.
    pub attached_to: String,
    /// Owner document class.
    pub attached_to_class: String,
    /// Collection name on the owner (e.g. "subIssues", "labels").
    pub collection: String,
}

impl Attachment {
    /// Describe an attachment.
    pub fn new(
        attached_to: impl Into<String>,
        attached_to_class: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            attached_to: attached_to.into(),
            attached_to_class: attached_to_class.into(),
            collection: collection.into(),
        }
    }
}

/// Outcome of an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxResult {
    /// The document after the update, when it was requested.
    pub object: Option<Value>,
}

/// The document-store operations the tracker depends on.
///
/// Implementations must be `Send + Sync`; a single instance is shared by
/// every concurrently running tool call.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All documents of `class` matching `query`.
    async fn find_all(
        &self,
        class: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Value>>;

    /// The first document of `class` matching `query`.
    async fn find_one(
        &self,
        class: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Option<Value>> {
        let options = options.clone().limit(1);
        Ok(self
            .find_all(class, query, &options)
            .await?
            .into_iter()
            .next())
    }

    /// Create a document, returning its id (`id` or a generated one).
    async fn create_doc(
        &self,
        class: &str,
        space: &str,
        attributes: Attributes,
        id: Option<String>,
    ) -> Result<String>;

    /// Apply `update` to one document.
    ///
    /// With `retrieve` the returned [`TxResult`] carries the updated document.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the document does not exist.
    async fn update_doc(
        &self,
        class: &str,
        space: &str,
        id: &str,
        update: &DocUpdate,
        retrieve: bool,
    ) -> Result<TxResult>;

    /// Remove a document.
    async fn remove_doc(&self, class: &str, space: &str, id: &str) -> Result<()>;

    /// Create a document attached to an owner's collection.
    async fn add_collection(
        &self,
        class: &str,
        space: &str,
        attachment: &Attachment,
        attributes: Attributes,
        id: Option<String>,
    ) -> Result<String>;

    /// Update an attached document and (re)tag its attachment.
    async fn update_collection(
        &self,
        class: &str,
        space: &str,
        id: &str,
        attachment: &Attachment,
        update: &DocUpdate,
    ) -> Result<()>;

    /// Store markdown as rich text, returning an opaque reference.
    async fn upload_markup(
        &self,
        class: &str,
        id: &str,
        attribute: &str,
        markdown: &str,
    ) -> Result<String>;

    /// Load the markdown behind a reference from [`Backend::upload_markup`].
    async fn fetch_markup(
        &self,
        class: &str,
        id: &str,
        attribute: &str,
        reference: &str,
    ) -> Result<String>;

    /// End the session.
    async fn close(&self) -> Result<()>;
}

impl<'a> dyn Backend + 'a {
    /// [`Backend::find_all`], deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors and returns `Error::Json` for documents that
    /// do not match `T`.
    pub async fn find_all_as<T: DeserializeOwned>(
        &self,
        class: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<T>> {
        self.find_all(class, query, options)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Error::from))
            .collect()
    }

    /// [`Backend::find_one`], deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors and returns `Error::Json` for a document
    /// that does not match `T`.
    pub async fn find_one_as<T: DeserializeOwned>(
        &self,
        class: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Option<T>> {
        self.find_one(class, query, options)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }
}
