//! In-memory document store.
//!
//! Holds every document as JSON in RAM; nothing survives the process. It
//! implements the full [`Backend`] contract, including atomic `$inc` and
//! collection counters, so the tracker's consistency rules can be exercised
//! without a platform instance.
//!
//! # Thread Safety
//!
//! State lives in `Arc<Mutex<InMemoryBackendInner>>`. Each trait method takes
//! the lock once, which makes every call atomic with respect to the document
//! it touches, matching the platform's per-document serialization. Clones
//! share state.

use super::{Attachment, Attributes, Backend, DocUpdate, FindOptions, Query, SortOrder, TxResult};
use crate::config::HulyConfig;
use crate::connection::Connector;
use crate::error::{Error, Result};
use crate::id_generation::generate_id;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Documents of one class keyed by id. `BTreeMap` keeps unsorted finds stable.
type ClassStore = BTreeMap<String, Value>;

#[derive(Default)]
struct InMemoryBackendInner {
    /// Documents by class, then id.
    classes: HashMap<String, ClassStore>,

    /// Markdown by markup reference.
    markup: HashMap<String, String>,

    /// Set once `close` has run; later calls fail like a dropped session.
    closed: bool,
}

impl InMemoryBackendInner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Connection("session closed".to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, class: &str, id: String, doc: Value) {
        self.classes
            .entry(class.to_string())
            .or_default()
            .insert(id, doc);
    }

    fn find_mut(&mut self, class: &str, id: &str) -> Option<&mut Value> {
        self.classes.get_mut(class)?.get_mut(id)
    }

    /// Locate a document by id in any class.
    fn find_any_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.classes.values_mut().find_map(|docs| docs.get_mut(id))
    }
}

/// A cloneable, shared in-memory [`Backend`].
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<InMemoryBackendInner>>,
}

impl InMemoryBackend {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fixture document as-is.
    ///
    /// `doc` must carry an `_id`; `_class` is filled in when missing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `doc` is not an object with a string `_id`.
    pub async fn seed(&self, class: &str, doc: Value) -> Result<String> {
        let mut fields = match doc {
            Value::Object(fields) => fields,
            other => {
                return Err(Error::validation(
                    "document",
                    other.to_string(),
                    "Expected a JSON object",
                ));
            }
        };
        let id = fields
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::validation("document", "", "Fixture documents need an _id"))?;
        fields
            .entry("_class")
            .or_insert_with(|| Value::String(class.to_string()));

        self.inner
            .lock()
            .await
            .insert(class, id.clone(), Value::Object(fields));
        Ok(id)
    }

    /// Fetch a raw document by class and id.
    pub async fn get(&self, class: &str, id: &str) -> Option<Value> {
        let inner = self.inner.lock().await;
        inner.classes.get(class)?.get(id).cloned()
    }

    /// Number of documents stored under `class`.
    pub async fn count(&self, class: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.classes.get(class).map_or(0, BTreeMap::len)
    }

    /// Whether [`Backend::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

fn new_document(class: &str, space: &str, id: &str, attributes: Attributes) -> Value {
    let mut doc = attributes;
    doc.insert("_id".to_string(), json!(id));
    doc.insert("_class".to_string(), json!(class));
    doc.insert("space".to_string(), json!(space));
    doc.insert("modifiedOn".to_string(), json!(Utc::now().timestamp_millis()));
    Value::Object(doc)
}

fn apply_update(doc: &mut Value, update: &DocUpdate) {
    let Value::Object(fields) = doc else {
        return;
    };
    for (field, value) in update.fields() {
        fields.insert(field.clone(), value.clone());
    }
    for (field, amount) in update.increments() {
        let current = fields.get(field).and_then(Value::as_i64).unwrap_or(0);
        let amount = amount.as_i64().unwrap_or(0);
        fields.insert(field.clone(), json!(current + amount));
    }
    fields.insert(
        "modifiedOn".to_string(),
        json!(Utc::now().timestamp_millis()),
    );
}

/// Add `amount` to the owner's counter named after the collection.
fn bump_counter(inner: &mut InMemoryBackendInner, attachment: &Attachment, amount: i64) {
    let Some(Value::Object(owner)) =
        inner.find_mut(&attachment.attached_to_class, &attachment.attached_to)
    else {
        return;
    };
    let current = match owner.get(&attachment.collection) {
        None | Some(Value::Null) => 0,
        Some(value) => match value.as_i64() {
            Some(count) => count,
            // Non-numeric field of the same name; not a counter.
            None => return,
        },
    };
    owner.insert(
        attachment.collection.clone(),
        json!((current + amount).max(0)),
    );
}

fn matches(doc: &Value, query: &Query) -> bool {
    query.predicates().all(|(field, predicate)| {
        let actual = doc.get(field);
        match predicate {
            Value::Null => actual.is_none_or(Value::is_null),
            Value::Object(op) if op.contains_key("$like") => {
                let pattern = op.get("$like").and_then(Value::as_str).unwrap_or_default();
                actual
                    .and_then(Value::as_str)
                    .is_some_and(|text| like(text, pattern))
            }
            expected => actual == Some(expected),
        }
    })
}

/// Case-insensitive match where `%` stands for any run of characters.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    // reachable[j]: pattern[..i] can match text[..j]
    let mut reachable = vec![false; text.len() + 1];
    reachable[0] = true;
    for &p in &pattern {
        let mut next = vec![false; text.len() + 1];
        if p == '%' {
            let mut seen = false;
            for j in 0..=text.len() {
                seen |= reachable[j];
                next[j] = seen;
            }
        } else {
            for j in 1..=text.len() {
                next[j] = reachable[j - 1] && text[j - 1] == p;
            }
        }
        reachable = next;
    }
    reachable[text.len()]
}

fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn find_all(
        &self,
        class: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Value>> {
        let inner = self.inner.lock().await;
        inner.ensure_open()?;

        let mut docs: Vec<Value> = inner
            .classes
            .get(class)
            .map(|docs| docs.values().filter(|doc| matches(doc, query)).cloned().collect())
            .unwrap_or_default();

        if !options.sort.is_empty() {
            docs.sort_by(|a, b| {
                options
                    .sort
                    .iter()
                    .map(|(field, order)| {
                        let ordering = compare_field(a.get(field), b.get(field));
                        match order {
                            SortOrder::Ascending => ordering,
                            SortOrder::Descending => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        if let Some(limit) = options.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn create_doc(
        &self,
        class: &str,
        space: &str,
        attributes: Attributes,
        id: Option<String>,
    ) -> Result<String> {
        let mut inner = self.inner.lock().await;
        inner.ensure_open()?;

        let id = id.unwrap_or_else(generate_id);
        tracing::debug!(class, space, id = %id, "create document");
        let doc = new_document(class, space, &id, attributes);
        inner.insert(class, id.clone(), doc);
        Ok(id)
    }

    async fn update_doc(
        &self,
        class: &str,
        _space: &str,
        id: &str,
        update: &DocUpdate,
        retrieve: bool,
    ) -> Result<TxResult> {
        let mut inner = self.inner.lock().await;
        inner.ensure_open()?;

        let doc = inner
            .find_mut(class, id)
            .ok_or_else(|| Error::not_found("Document", id))?;
        apply_update(doc, update);
        tracing::debug!(class, id, "update document");

        Ok(TxResult {
            object: retrieve.then(|| doc.clone()),
        })
    }

    async fn remove_doc(&self, class: &str, _space: &str, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.ensure_open()?;

        let removed = inner
            .classes
            .get_mut(class)
            .and_then(|docs| docs.remove(id))
            .ok_or_else(|| Error::not_found("Document", id))?;
        tracing::debug!(class, id, "remove document");

        let owner = removed.get("attachedTo").and_then(Value::as_str);
        let owner_class = removed.get("attachedToClass").and_then(Value::as_str);
        let collection = removed.get("collection").and_then(Value::as_str);
        if let (Some(owner), Some(owner_class), Some(collection)) = (owner, owner_class, collection)
        {
            let attachment = Attachment::new(owner, owner_class, collection);
            bump_counter(&mut inner, &attachment, -1);
        }
        Ok(())
    }

    async fn add_collection(
        &self,
        class: &str,
        space: &str,
        attachment: &Attachment,
        attributes: Attributes,
        id: Option<String>,
    ) -> Result<String> {
        let mut inner = self.inner.lock().await;
        inner.ensure_open()?;

        let id = id.unwrap_or_else(generate_id);
        let mut attributes = attributes;
        attributes.insert("attachedTo".to_string(), json!(attachment.attached_to));
        attributes.insert(
            "attachedToClass".to_string(),
            json!(attachment.attached_to_class),
        );
        attributes.insert("collection".to_string(), json!(attachment.collection));

        let doc = new_document(class, space, &id, attributes);
        inner.insert(class, id.clone(), doc);
        bump_counter(&mut inner, attachment, 1);
        tracing::debug!(
            class,
            id = %id,
            owner = %attachment.attached_to,
            collection = %attachment.collection,
            "add collection document"
        );
        Ok(id)
    }

    async fn update_collection(
        &self,
        class: &str,
        _space: &str,
        id: &str,
        attachment: &Attachment,
        update: &DocUpdate,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.ensure_open()?;

        let doc = inner
            .find_mut(class, id)
            .ok_or_else(|| Error::not_found("Document", id))?;
        let tagged = update
            .clone()
            .set("attachedTo", attachment.attached_to.clone())
            .set("attachedToClass", attachment.attached_to_class.clone())
            .set("collection", attachment.collection.clone());
        apply_update(doc, &tagged);
        tracing::debug!(class, id, collection = %attachment.collection, "update collection document");
        Ok(())
    }

    async fn upload_markup(
        &self,
        _class: &str,
        id: &str,
        attribute: &str,
        markdown: &str,
    ) -> Result<String> {
        let mut inner = self.inner.lock().await;
        inner.ensure_open()?;

        let reference = format!("{id}-{attribute}-{}", generate_id());
        inner.markup.insert(reference.clone(), markdown.to_string());
        Ok(reference)
    }

    async fn fetch_markup(
        &self,
        _class: &str,
        _id: &str,
        _attribute: &str,
        reference: &str,
    ) -> Result<String> {
        let inner = self.inner.lock().await;
        inner.ensure_open()?;

        inner
            .markup
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::not_found("Markup", reference))
    }

    async fn close(&self) -> Result<()> {
        self.inner.lock().await.closed = true;
        Ok(())
    }
}

impl InMemoryBackend {
    /// Reopen a closed store, keeping its documents.
    ///
    /// Lets a connector hand the same data to a fresh session after
    /// `release`.
    async fn reopen(&self) {
        self.inner.lock().await.closed = false;
    }

    /// Overwrite fields of a document in any class, bypassing the trait.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no document has that id.
    pub async fn patch(&self, id: &str, update: &DocUpdate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let doc = inner
            .find_any_mut(id)
            .ok_or_else(|| Error::not_found("Document", id))?;
        apply_update(doc, update);
        Ok(())
    }
}

/// A [`Connector`] that hands out an [`InMemoryBackend`].
///
/// Counts handshakes, and can be told to wait before completing or to fail a
/// number of upcoming attempts, so connection lifecycle behavior can be
/// observed.
pub struct InMemoryConnector {
    backend: InMemoryBackend,
    handshakes: AtomicUsize,
    failures: AtomicUsize,
    delay: Duration,
}

impl InMemoryConnector {
    /// A connector that succeeds immediately.
    #[must_use]
    pub fn new(backend: InMemoryBackend) -> Self {
        Self {
            backend,
            handshakes: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Make every handshake take `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `count` handshakes with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, AtomicOrdering::SeqCst);
    }

    /// Number of handshakes started so far.
    #[must_use]
    pub fn handshakes(&self) -> usize {
        self.handshakes.load(AtomicOrdering::SeqCst)
    }

    /// The store behind every session.
    #[must_use]
    pub fn backend(&self) -> &InMemoryBackend {
        &self.backend
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, config: &HulyConfig) -> Result<Arc<dyn Backend>> {
        self.handshakes.fetch_add(1, AtomicOrdering::SeqCst);
        tracing::debug!(workspace = %config.workspace, "in-memory handshake");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failed = self
            .failures
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok();
        if failed {
            return Err(Error::Connection("handshake rejected".to_string()));
        }

        self.backend.reopen().await;
        Ok(Arc::new(self.backend.clone()))
    }
}
