//! HTTP client for the platform's REST API.
//!
//! The [`RestConnector`] performs the account handshake:
//!
//! 1. `GET {url}/config.json` for the accounts and collaborator URLs
//! 2. `login` (email + password) unless a token was configured
//! 3. `selectWorkspace` for the transactor endpoint and a workspace token
//!
//! The resulting [`RestBackend`] reads with `find-all` and writes by posting
//! transactions. Rich text goes through the collaborator service.

use super::markup::{markdown_to_markup, markup_to_markdown};
use super::{Attachment, Attributes, Backend, DocUpdate, FindOptions, Query, TxResult};
use crate::config::{Credentials, HulyConfig};
use crate::connection::Connector;
use crate::error::{Error, Result};
use crate::id_generation::generate_id;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

const TX_SPACE: &str = "core:space:Tx";
const SYSTEM_ACCOUNT: &str = "core:account:System";

mod tx_class {
    pub const CREATE: &str = "core:class:TxCreateDoc";
    pub const UPDATE: &str = "core:class:TxUpdateDoc";
    pub const REMOVE: &str = "core:class:TxRemoveDoc";
}

/// Convert a non-success response into an error, otherwise decode the body.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Connection(format!("{status}: authentication rejected"))
        }
        _ => Error::Backend(format!("{status}: {body}")),
    })
}

/// Unwrap a JSON-RPC style `{ "result": … }` / `{ "error": … }` envelope.
fn rpc_result<T: DeserializeOwned>(method: &str, envelope: Value) -> Result<T> {
    if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
        return Err(Error::Connection(format!("{method} failed: {error}")));
    }
    let result = envelope
        .get("result")
        .cloned()
        .ok_or_else(|| Error::Connection(format!("{method} returned no result")))?;
    Ok(serde_json::from_value(result)?)
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
    #[serde(rename = "ACCOUNTS_URL")]
    accounts_url: String,
    #[serde(rename = "COLLABORATOR_URL", default)]
    collaborator_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginInfo {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceLoginInfo {
    endpoint: String,
    token: String,
    #[serde(default)]
    workspace: Option<String>,
    #[serde(default)]
    workspace_id: Option<String>,
    #[serde(default)]
    account: Option<String>,
}

/// Opens [`RestBackend`] sessions.
#[derive(Debug, Clone, Default)]
pub struct RestConnector {
    client: Client,
}

impl RestConnector {
    /// A connector with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        accounts_url: &str,
        token: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<T> {
        let mut request = self
            .client
            .post(accounts_url)
            .json(&json!({ "method": method, "params": params }));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let envelope: Value = handle_response(request.send().await?).await?;
        rpc_result(method, envelope)
    }
}

#[async_trait]
impl Connector for RestConnector {
    async fn connect(&self, config: &HulyConfig) -> Result<Arc<dyn Backend>> {
        let credentials = config.credentials.as_ref().ok_or_else(|| {
            Error::Configuration("no credentials configured".to_string())
        })?;

        let server: ServerConfig = handle_response(
            self.client
                .get(format!("{}/config.json", config.url))
                .send()
                .await?,
        )
        .await?;
        tracing::debug!(accounts = %server.accounts_url, "Fetched server config");

        let account_token = match credentials {
            Credentials::Token(token) => token.clone(),
            Credentials::Password { email, password } => {
                let login: LoginInfo = self
                    .rpc(
                        &server.accounts_url,
                        None,
                        "login",
                        json!({ "email": email, "password": password }),
                    )
                    .await?;
                login.token
            }
        };

        let info: WorkspaceLoginInfo = self
            .rpc(
                &server.accounts_url,
                Some(&account_token),
                "selectWorkspace",
                json!({ "workspaceUrl": config.workspace, "kind": "external" }),
            )
            .await?;

        let workspace = info
            .workspace
            .or(info.workspace_id)
            .unwrap_or_else(|| config.workspace.clone());
        tracing::info!(endpoint = %info.endpoint, workspace = %workspace, "Workspace selected");

        Ok(Arc::new(RestBackend {
            client: self.client.clone(),
            endpoint: http_endpoint(&info.endpoint),
            collaborator: server.collaborator_url.map(|u| http_endpoint(&u)),
            workspace,
            token: info.token,
            account: info.account.unwrap_or_else(|| SYSTEM_ACCOUNT.to_string()),
        }))
    }
}

/// Rewrite a websocket transactor URL to its HTTP form.
fn http_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if let Some(rest) = endpoint.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = endpoint.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        endpoint.to_string()
    }
}

/// A session against the REST API.
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    endpoint: String,
    collaborator: Option<String>,
    workspace: String,
    token: String,
    account: String,
}

impl RestBackend {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/api/v1/{path}/{}", self.endpoint, self.workspace);
        self.client.request(method, url).bearer_auth(&self.token)
    }

    fn tx_envelope(&self, tx_class: &str, class: &str, space: &str, id: &str) -> Attributes {
        let mut tx = Attributes::new();
        tx.insert("_id".to_string(), json!(generate_id()));
        tx.insert("_class".to_string(), json!(tx_class));
        tx.insert("space".to_string(), json!(TX_SPACE));
        tx.insert("objectId".to_string(), json!(id));
        tx.insert("objectClass".to_string(), json!(class));
        tx.insert("objectSpace".to_string(), json!(space));
        tx.insert("modifiedOn".to_string(), json!(Utc::now().timestamp_millis()));
        tx.insert("modifiedBy".to_string(), json!(self.account));
        tx
    }

    async fn post_tx(&self, tx: Attributes) -> Result<Value> {
        tracing::debug!(
            tx = %tx.get("_class").and_then(serde_json::Value::as_str).unwrap_or_default(),
            object = %tx.get("objectId").and_then(serde_json::Value::as_str).unwrap_or_default(),
            "Posting transaction"
        );
        let response = self
            .request(Method::POST, "tx")
            .json(&Value::Object(tx))
            .send()
            .await?;
        handle_response(response).await
    }

    fn with_attachment(tx: &mut Attributes, attachment: &Attachment) {
        tx.insert("attachedTo".to_string(), json!(attachment.attached_to));
        tx.insert(
            "attachedToClass".to_string(),
            json!(attachment.attached_to_class),
        );
        tx.insert("collection".to_string(), json!(attachment.collection));
    }

    async fn collaborator_rpc(&self, method: &str, document: &str, payload: Value) -> Result<Value> {
        let base = self.collaborator.as_deref().ok_or_else(|| {
            Error::Backend("server does not advertise a collaborator service".to_string())
        })?;
        let response = self
            .client
            .post(format!("{base}/rpc/{}", self.workspace))
            .bearer_auth(&self.token)
            .json(&json!({ "method": method, "documentId": document, "payload": payload }))
            .send()
            .await?;
        handle_response(response).await
    }

    fn collaborative_doc(&self, class: &str, id: &str, attribute: &str) -> String {
        format!("{}|{class}|{id}|{attribute}", self.workspace)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn find_all(
        &self,
        class: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Value>> {
        let query = serde_json::to_string(query)?;
        let options = serde_json::to_string(&options.to_value())?;
        let response = self
            .request(Method::GET, "find-all")
            .query(&[
                ("class", class),
                ("query", query.as_str()),
                ("options", options.as_str()),
            ])
            .send()
            .await?;

        match handle_response::<Value>(response).await? {
            Value::Array(docs) => Ok(docs),
            Value::Object(mut result) => match result.remove("value") {
                Some(Value::Array(docs)) => Ok(docs),
                _ => Err(Error::Backend("find-all returned no documents".to_string())),
            },
            other => Err(Error::Backend(format!("unexpected find-all result: {other}"))),
        }
    }

    async fn create_doc(
        &self,
        class: &str,
        space: &str,
        attributes: Attributes,
        id: Option<String>,
    ) -> Result<String> {
        let id = id.unwrap_or_else(generate_id);
        let mut tx = self.tx_envelope(tx_class::CREATE, class, space, &id);
        tx.insert("attributes".to_string(), Value::Object(attributes));
        self.post_tx(tx).await?;
        Ok(id)
    }

    async fn update_doc(
        &self,
        class: &str,
        space: &str,
        id: &str,
        update: &DocUpdate,
        retrieve: bool,
    ) -> Result<TxResult> {
        let mut tx = self.tx_envelope(tx_class::UPDATE, class, space, id);
        tx.insert("operations".to_string(), update.to_operations());
        tx.insert("retrieve".to_string(), json!(retrieve));

        let result = self.post_tx(tx).await?;
        let object = result.get("object").filter(|o| !o.is_null()).cloned();
        if retrieve && object.is_none() {
            return Err(Error::not_found("Document", id));
        }
        Ok(TxResult { object })
    }

    async fn remove_doc(&self, class: &str, space: &str, id: &str) -> Result<()> {
        let tx = self.tx_envelope(tx_class::REMOVE, class, space, id);
        self.post_tx(tx).await?;
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
        let id = id.unwrap_or_else(generate_id);
        let mut attributes = attributes;
        Self::with_attachment(&mut attributes, attachment);

        let mut tx = self.tx_envelope(tx_class::CREATE, class, space, &id);
        Self::with_attachment(&mut tx, attachment);
        tx.insert("attributes".to_string(), Value::Object(attributes));
        self.post_tx(tx).await?;
        Ok(id)
    }

    async fn update_collection(
        &self,
        class: &str,
        space: &str,
        id: &str,
        attachment: &Attachment,
        update: &DocUpdate,
    ) -> Result<()> {
        let mut tx = self.tx_envelope(tx_class::UPDATE, class, space, id);
        Self::with_attachment(&mut tx, attachment);
        tx.insert("operations".to_string(), update.to_operations());
        self.post_tx(tx).await?;
        Ok(())
    }

    async fn upload_markup(
        &self,
        class: &str,
        id: &str,
        attribute: &str,
        markdown: &str,
    ) -> Result<String> {
        let document = self.collaborative_doc(class, id, attribute);
        let markup = serde_json::to_string(&markdown_to_markup(markdown))?;
        let result = self
            .collaborator_rpc(
                "createContent",
                &document,
                json!({ "content": { attribute: markup } }),
            )
            .await?;

        result
            .pointer(&format!("/content/{attribute}"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Backend(format!("no markup reference returned for {document}")))
    }

    async fn fetch_markup(
        &self,
        class: &str,
        id: &str,
        attribute: &str,
        reference: &str,
    ) -> Result<String> {
        let document = self.collaborative_doc(class, id, attribute);
        let result = self
            .collaborator_rpc("getContent", &document, json!({ "source": reference }))
            .await?;

        let markup = match result.pointer(&format!("/content/{attribute}")) {
            Some(Value::String(raw)) => serde_json::from_str(raw)?,
            Some(doc @ Value::Object(_)) => doc.clone(),
            _ => return Err(Error::not_found("Markup", reference)),
        };
        Ok(markup_to_markdown(&markup))
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!(workspace = %self.workspace, "Closing REST session");
        Ok(())
    }
}
