//! Firestore document store over the REST v1 API.
//!
//! Documents live in the `chats` collection. Each holds the full message
//! list of one chat together with its owner and last-update timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gloo_net::http::{Request, RequestBuilder, Response};
use serde_json::{json, Map, Value};

use chat_core::ports::DocumentStorePort;
use chat_types::{
    ChatError, Result,
    chat::ChatDocument,
    config::FirestoreConfig,
    message::{Message, Role},
};

const API_ROOT: &str = "https://firestore.googleapis.com/v1";
pub const COLLECTION: &str = "chats";

pub struct FirestoreStorage {
    config: FirestoreConfig,
}

impl FirestoreStorage {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        if !config.has_credentials() {
            return Err(ChatError::Config(
                "Firestore needs a project id and an access token or api key".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            API_ROOT, self.config.project_id, self.config.database
        )
    }

    fn document_url(&self, doc_id: &str) -> String {
        let encoded = String::from(js_sys::encode_uri_component(doc_id));
        format!("{}/{}/{}", self.documents_root(), COLLECTION, encoded)
    }

    /// Attach credentials: bearer token if present, otherwise the web api key
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match (&self.config.access_token, &self.config.api_key) {
            (Some(token), _) if !token.is_empty() => {
                builder.header("Authorization", &format!("Bearer {}", token))
            }
            (_, Some(key)) => builder.query([("key", key.as_str())]),
            _ => builder,
        }
    }
}

#[async_trait(?Send)]
impl DocumentStorePort for FirestoreStorage {
    async fn put(&self, doc_id: &str, doc: &ChatDocument) -> Result<()> {
        let body = json!({ "fields": encode_fields(doc) });
        let response = self
            .authorize(Request::patch(&self.document_url(doc_id)))
            .json(&body)
            .map_err(|e| ChatError::Serialization(e.to_string()))?
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        check_status(response).await?;
        log::debug!("Firestore: saved {}", doc_id);
        Ok(())
    }

    async fn delete(&self, doc_id: &str) -> Result<()> {
        let response = self
            .authorize(Request::delete(&self.document_url(doc_id)))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        check_status(response).await?;
        log::debug!("Firestore: deleted {}", doc_id);
        Ok(())
    }

    async fn query_by_user(&self, user_id: &str) -> Result<Vec<(String, ChatDocument)>> {
        let url = format!("{}:runQuery", self.documents_root());
        let response = self
            .authorize(Request::post(&url))
            .json(&user_query(user_id))
            .map_err(|e| ChatError::Serialization(e.to_string()))?
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        let response = check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ChatError::Serialization(e.to_string()))?;
        parse_query_response(&body)
    }

    fn backend_name(&self) -> &str {
        "firestore"
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    Err(ChatError::Storage(format!("Firestore HTTP {}: {}", status, message)))
}

// ─── Wire format ─────────────────────────────────────────────

/// Structured query selecting every chat document owned by `user_id`
pub fn user_query(user_id: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": COLLECTION }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "user_id" },
                    "op": "EQUAL",
                    "value": { "stringValue": user_id }
                }
            }
        }
    })
}

/// Typed Firestore `fields` map for a chat document
pub fn encode_fields(doc: &ChatDocument) -> Value {
    let messages: Vec<Value> = doc
        .messages
        .iter()
        .map(|m| {
            json!({
                "mapValue": {
                    "fields": {
                        "role": { "stringValue": m.role.as_str() },
                        "content": { "stringValue": m.content }
                    }
                }
            })
        })
        .collect();

    json!({
        "messages": { "arrayValue": { "values": messages } },
        "updated_at": { "timestampValue": doc.updated_at.to_rfc3339() },
        "user_id": { "stringValue": doc.user_id }
    })
}

/// Decode a Firestore document resource into (document id, chat document)
pub fn decode_document(resource: &Value) -> Result<(String, ChatDocument)> {
    let name = resource["name"]
        .as_str()
        .ok_or_else(|| ChatError::Storage("Firestore document without name".to_string()))?;
    let doc_id = name.rsplit('/').next().unwrap_or(name).to_string();

    let empty = Map::new();
    let fields = resource["fields"].as_object().unwrap_or(&empty);

    let user_id = fields
        .get("user_id")
        .and_then(|v| v["stringValue"].as_str())
        .unwrap_or_default()
        .to_string();

    let updated_at = fields
        .get("updated_at")
        .and_then(|v| v["timestampValue"].as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let messages = match fields
        .get("messages")
        .and_then(|v| v["arrayValue"]["values"].as_array())
    {
        Some(values) => values
            .iter()
            .map(decode_message)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok((doc_id, ChatDocument { messages, updated_at, user_id }))
}

fn decode_message(value: &Value) -> Result<Message> {
    let fields = &value["mapValue"]["fields"];
    let role = fields["role"]["stringValue"]
        .as_str()
        .and_then(Role::parse)
        .ok_or_else(|| ChatError::Storage(format!("Invalid message role in {}", value)))?;
    let content = fields["content"]["stringValue"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    Ok(Message { role, content })
}

/// runQuery answers with an array; entries without a `document` only carry a read time
pub fn parse_query_response(body: &Value) -> Result<Vec<(String, ChatDocument)>> {
    let entries = body
        .as_array()
        .ok_or_else(|| ChatError::Storage("Unexpected runQuery response".to_string()))?;

    let mut docs = Vec::new();
    for entry in entries {
        if let Some(err) = entry["error"]["message"].as_str() {
            return Err(ChatError::Storage(err.to_string()));
        }
        if entry.get("document").is_some() {
            docs.push(decode_document(&entry["document"])?);
        }
    }
    Ok(docs)
}
