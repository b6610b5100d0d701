use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::error::StoreError;

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Document ids follow the hosted SDK convention: 20 alphanumeric
/// characters, generated client-side.
const DOCUMENT_ID_LEN: usize = 20;
const STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Partial interview record. Only fields present in the patch are written,
/// so a merge never clobbers unrelated stored fields and repeated writes
/// with the same payload are idempotent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InterviewPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub interview_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub techstack: Option<Vec<String>>,
    #[serde(rename = "questionCount", skip_serializing_if = "Option::is_none")]
    pub question_count: Option<u32>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized: Option<bool>,
}

/// One candidate answer, keyed by its sequence number within the
/// interview. A later write with the same sequence replaces the earlier
/// one.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    pub sequence: u32,
}

/// Write surface over the interview document store. The store injects its
/// own `createdAt` timestamp on every write.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait DocumentStore: Send + Sync {
    /// Allocates a fresh interview document id.
    fn allocate_interview_id(&self) -> String;

    /// Merge-writes the patch into `interviews/{interview_id}`.
    async fn merge_interview(
        &self,
        interview_id: &str,
        patch: &InterviewPatch,
    ) -> Result<(), StoreError>;

    /// Upserts `interviews/{interview_id}/answers/{sequence}`.
    async fn put_answer(
        &self,
        interview_id: &str,
        record: &AnswerRecord,
    ) -> Result<(), StoreError>;
}

fn new_document_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(DOCUMENT_ID_LEN)
        .map(char::from)
        .collect()
}

fn record_fields<T: Serialize>(record: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::Serialization(<serde_json::Error as serde::ser::Error>::custom(
            "record did not serialize to an object",
        ))),
    }
}

/// In-memory store with the same merge and upsert semantics as the hosted
/// document store. Substitutable for it in tests and local development.
#[derive(Debug, Default)]
pub struct MemoryStore {
    interviews: Mutex<HashMap<String, Map<String, Value>>>,
    answers: Mutex<HashMap<String, BTreeMap<u32, Map<String, Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored interview document.
    pub async fn interview(&self, interview_id: &str) -> Option<Value> {
        self.interviews
            .lock()
            .await
            .get(interview_id)
            .cloned()
            .map(Value::Object)
    }

    /// Snapshot of a stored answer document.
    pub async fn answer(&self, interview_id: &str, sequence: u32) -> Option<Value> {
        self.answers
            .lock()
            .await
            .get(interview_id)
            .and_then(|answers| answers.get(&sequence))
            .cloned()
            .map(Value::Object)
    }

    pub async fn answer_count(&self, interview_id: &str) -> usize {
        self.answers
            .lock()
            .await
            .get(interview_id)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn allocate_interview_id(&self) -> String {
        new_document_id()
    }

    async fn merge_interview(
        &self,
        interview_id: &str,
        patch: &InterviewPatch,
    ) -> Result<(), StoreError> {
        let fields = record_fields(patch)?;
        let mut interviews = self.interviews.lock().await;
        let document = interviews.entry(interview_id.to_owned()).or_default();
        for (key, value) in fields {
            document.insert(key, value);
        }
        document.insert("createdAt".to_owned(), json!(Utc::now().to_rfc3339()));
        Ok(())
    }

    async fn put_answer(
        &self,
        interview_id: &str,
        record: &AnswerRecord,
    ) -> Result<(), StoreError> {
        let mut fields = record_fields(record)?;
        fields.insert("createdAt".to_owned(), json!(Utc::now().to_rfc3339()));
        self.answers
            .lock()
            .await
            .entry(interview_id.to_owned())
            .or_default()
            .insert(record.sequence, fields);
        Ok(())
    }
}

/// Firestore REST implementation. Writes go through `documents:commit` so
/// a merge can carry an update mask and the server assigns `createdAt`.
pub struct FirestoreStore {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    auth_token: Option<SecretString>,
}

impl FirestoreStore {
    pub fn new(
        project_id: impl Into<String>,
        auth_token: Option<SecretString>,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().timeout(STORE_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: FIRESTORE_BASE_URL.to_owned(),
            project_id: project_id.into(),
            auth_token,
        })
    }

    /// Points the client at a different endpoint (emulator, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn document_name(&self, path: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}",
            self.project_id, path
        )
    }

    async fn commit(&self, write: Value) -> Result<(), StoreError> {
        let url = format!(
            "{}/projects/{}/databases/(default)/documents:commit",
            self.base_url, self.project_id
        );
        let mut request = self.http.post(&url).json(&json!({ "writes": [write] }));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        if status >= 400 {
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected { status, detail });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn allocate_interview_id(&self) -> String {
        new_document_id()
    }

    async fn merge_interview(
        &self,
        interview_id: &str,
        patch: &InterviewPatch,
    ) -> Result<(), StoreError> {
        let fields = record_fields(patch)?;
        let mask: Vec<&String> = fields.keys().collect();
        let write = json!({
            "update": {
                "name": self.document_name(&format!("interviews/{interview_id}")),
                "fields": encode_fields(&fields),
            },
            "updateMask": { "fieldPaths": mask },
            "updateTransforms": [created_at_transform()],
        });
        self.commit(write).await
    }

    async fn put_answer(
        &self,
        interview_id: &str,
        record: &AnswerRecord,
    ) -> Result<(), StoreError> {
        let fields = record_fields(record)?;
        let write = json!({
            "update": {
                "name": self.document_name(&format!(
                    "interviews/{interview_id}/answers/{}",
                    record.sequence
                )),
                "fields": encode_fields(&fields),
            },
            "updateTransforms": [created_at_transform()],
        });
        self.commit(write).await
    }
}

fn created_at_transform() -> Value {
    json!({ "fieldPath": "createdAt", "setToServerValue": "REQUEST_TIME" })
}

fn encode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

/// Encodes a plain JSON value into Firestore's typed value representation.
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) if number.is_f64() => json!({ "doubleValue": number }),
        Value::Number(number) => json!({ "integerValue": number.to_string() }),
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merge_keeps_fields_outside_the_patch() {
        let store = MemoryStore::new();

        store
            .merge_interview(
                "i1",
                &InterviewPatch {
                    role: Some("Backend".to_owned()),
                    ..InterviewPatch::default()
                },
            )
            .await
            .expect("first merge");
        store
            .merge_interview(
                "i1",
                &InterviewPatch {
                    level: Some("Senior".to_owned()),
                    ..InterviewPatch::default()
                },
            )
            .await
            .expect("second merge");

        let document = store.interview("i1").await.expect("document exists");
        assert_eq!(document["role"], "Backend");
        assert_eq!(document["level"], "Senior");
        assert!(document.get("createdAt").is_some());
    }

    #[tokio::test]
    async fn answer_writes_upsert_by_sequence() {
        let store = MemoryStore::new();

        store
            .put_answer(
                "i1",
                &AnswerRecord {
                    question: "Q3".to_owned(),
                    answer: "first attempt".to_owned(),
                    sequence: 3,
                },
            )
            .await
            .expect("first write");
        store
            .put_answer(
                "i1",
                &AnswerRecord {
                    question: "Q3".to_owned(),
                    answer: "second attempt".to_owned(),
                    sequence: 3,
                },
            )
            .await
            .expect("second write");

        assert_eq!(store.answer_count("i1").await, 1);
        let document = store.answer("i1", 3).await.expect("answer exists");
        assert_eq!(document["answer"], "second attempt");
        assert_eq!(document["sequence"], 3);
    }

    #[test]
    fn allocated_ids_look_like_sdk_ids() {
        let store = MemoryStore::new();
        let first = store.allocate_interview_id();
        let second = store.allocate_interview_id();

        assert_eq!(first.len(), 20);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[test]
    fn encodes_typed_firestore_values() {
        let fields = record_fields(&InterviewPatch {
            role: Some("Backend Engineer".to_owned()),
            techstack: Some(vec!["Go".to_owned(), "Postgres".to_owned()]),
            question_count: Some(5),
            finalized: Some(false),
            ..InterviewPatch::default()
        })
        .expect("serializes");
        let encoded = encode_fields(&fields);

        assert_eq!(encoded["role"]["stringValue"], "Backend Engineer");
        assert_eq!(encoded["questionCount"]["integerValue"], "5");
        assert_eq!(encoded["finalized"]["booleanValue"], false);
        assert_eq!(
            encoded["techstack"]["arrayValue"]["values"][1]["stringValue"],
            "Postgres"
        );
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let fields = record_fields(&InterviewPatch {
            level: Some("Senior".to_owned()),
            ..InterviewPatch::default()
        })
        .expect("serializes");

        assert_eq!(fields.len(), 1);
        assert_eq!(fields["level"], "Senior");
    }
}
