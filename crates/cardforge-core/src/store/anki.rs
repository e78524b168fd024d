//! AnkiConnect client.
//!
//! Talks to the AnkiConnect add-on (API version 6) over HTTP. Only loopback
//! endpoints are accepted.

use super::render::ENRICHED_FIELDS;
use super::{NewNote, NoteInfo, NoteStore};
use crate::error::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const API_VERSION: u32 = 6;
/// Notes per `addNotes` call.
const ADD_BATCH_SIZE: usize = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const NOTE_CSS: &str = "\
.card{font-family:Arial,sans-serif;font-size:20px;text-align:center;color:#000;background:#fff}
.front{font-weight:bold;font-size:24px;margin-bottom:20px}
.original-antwort{background:#f5f5f5;padding:10px;margin:10px 0;border-left:3px solid #9e9e9e;text-align:left;font-size:16px;color:#666}
.optionen{background:#fff9e6;padding:12px;margin:10px 0;border-left:3px solid #ff9800;text-align:left;font-size:16px}
.loesung{background:#e3f2fd;padding:15px;margin:20px 0;border-left:4px solid #2196F3;text-align:left;font-weight:bold;font-size:22px}
.erklaerung{background:#f0f0f0;padding:15px;margin-top:20px;border-left:4px solid #4CAF50;text-align:left}
.eselsbruecke{background:#fff3cd;padding:15px;margin-top:10px;border-left:4px solid #ffc107;text-align:left;font-style:italic}
.referenz{background:#e8f5e9;padding:10px;margin-top:15px;border-left:4px solid #66bb6a;text-align:left;font-size:14px;color:#555}
.extra1{background:#f3e5f5;padding:15px;margin-top:15px;border-left:4px solid #9c27b0;text-align:left;font-size:16px}";

const BACK_TEMPLATE: &str = r#"<div class="front">{{Front}}</div><hr>
{{#Optionen}}<div class="optionen"><strong>OPTIONEN:</strong><br>{{Optionen}}</div>{{/Optionen}}
{{#Lösung}}<div class="loesung"><strong>LÖSUNG:</strong><br>{{Lösung}}</div>{{/Lösung}}
{{#Original-Antwort}}<div class="original-antwort"><strong>Original-Antwort:</strong><br>{{Original-Antwort}}</div>{{/Original-Antwort}}
{{#Erklärung}}<div class="erklaerung"><strong>ERKLÄRUNG:</strong><br>{{Erklärung}}</div>{{/Erklärung}}
{{#Eselsbrücke}}<div class="eselsbruecke"><strong>ESELSBRÜCKE:</strong><br>{{Eselsbrücke}}</div>{{/Eselsbrücke}}
{{#Referenz}}<div class="referenz"><strong>REFERENZ:</strong> {{Referenz}}</div>{{/Referenz}}
{{#Extra 1}}<div class="extra1"><strong>EXTRA:</strong><br>{{Extra 1}}</div>{{/Extra 1}}"#;

// --- Request types ---

#[derive(Serialize)]
struct ActionRequest<'a> {
    action: &'a str,
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotePayload<'a> {
    deck_name: &'a str,
    model_name: &'a str,
    fields: &'a BTreeMap<String, String>,
    tags: &'a [String],
}

// --- Response types ---

#[derive(Deserialize)]
struct ActionResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// AnkiConnect-backed [`NoteStore`].
pub struct AnkiConnect {
    url: String,
    note_type: String,
    client: reqwest::Client,
}

impl AnkiConnect {
    /// Create a client for `url`, creating enriched notes as `note_type`.
    ///
    /// Fails with [`StoreError::NotLocal`] unless the host is loopback.
    pub fn new(url: &str, note_type: &str) -> Result<Self, StoreError> {
        if !is_loopback(url) {
            return Err(StoreError::NotLocal(url.to_string()));
        }
        Ok(Self {
            url: url.to_string(),
            note_type: note_type.to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Option<Value>,
    ) -> Result<T, StoreError> {
        tracing::debug!("AnkiConnect {action}");
        let resp = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(&ActionRequest {
                action,
                version: API_VERSION,
                params,
            })
            .send()
            .await
            .map_err(|e| {
                tracing::debug!("AnkiConnect transport error: {e}");
                StoreError::Unreachable {
                    url: self.url.clone(),
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
            });
        }

        let body: ActionResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Some(error) = body.error.filter(|e| !e.is_empty()) {
            return Err(StoreError::Api(error));
        }
        serde_json::from_value(body.result).map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// AnkiConnect API version; doubles as a connectivity check.
    pub async fn version(&self) -> Result<u32, StoreError> {
        self.request("version", None).await
    }

    /// Create the enriched note type unless it already exists.
    pub async fn ensure_note_type(&self) -> Result<(), StoreError> {
        let models: Vec<String> = self.request("modelNames", None).await?;
        if models.iter().any(|m| m == &self.note_type) {
            return Ok(());
        }
        tracing::info!("Creating note type {:?}", self.note_type);
        let params = json!({
            "modelName": self.note_type,
            "inOrderFields": ENRICHED_FIELDS,
            "css": NOTE_CSS,
            "cardTemplates": [{
                "Name": "Card 1",
                "Front": "<div class=\"front\">{{Front}}</div>",
                "Back": BACK_TEMPLATE,
            }],
        });
        let _: Value = self.request("createModel", Some(params)).await?;
        Ok(())
    }

    /// Create `deck` unless it already exists.
    pub async fn ensure_deck(&self, deck: &str) -> Result<(), StoreError> {
        let decks = self.list_decks().await?;
        if decks.iter().any(|d| d == deck) {
            return Ok(());
        }
        tracing::info!("Creating deck {deck:?}");
        let _: Value = self
            .request("createDeck", Some(json!({ "deck": deck })))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl NoteStore for AnkiConnect {
    async fn list_decks(&self) -> Result<Vec<String>, StoreError> {
        self.request("deckNames", None).await
    }

    async fn find_notes(&self, query: &str) -> Result<Vec<u64>, StoreError> {
        self.request("findNotes", Some(json!({ "query": query })))
            .await
    }

    async fn notes_info(&self, ids: &[u64]) -> Result<Vec<NoteInfo>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.request("notesInfo", Some(json!({ "notes": ids })))
            .await
    }

    async fn add_notes(&self, deck: &str, notes: &[NewNote]) -> Result<Vec<Option<u64>>, StoreError> {
        if notes.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_note_type().await?;
        self.ensure_deck(deck).await?;

        let mut ids = Vec::with_capacity(notes.len());
        for batch in notes.chunks(ADD_BATCH_SIZE) {
            let payload: Vec<NotePayload<'_>> = batch
                .iter()
                .map(|note| NotePayload {
                    deck_name: deck,
                    model_name: &self.note_type,
                    fields: &note.fields,
                    tags: &note.tags,
                })
                .collect();
            let created: Vec<Option<u64>> = self
                .request("addNotes", Some(json!({ "notes": payload })))
                .await?;
            if created.len() != batch.len() {
                return Err(StoreError::Decode(format!(
                    "addNotes returned {} ids for {} notes",
                    created.len(),
                    batch.len()
                )));
            }
            ids.extend(created);
        }

        let rejected = ids.iter().filter(|id| id.is_none()).count();
        if rejected > 0 {
            tracing::warn!("{rejected} of {} notes were rejected by Anki", ids.len());
        }
        Ok(ids)
    }

    async fn update_note_fields(
        &self,
        id: u64,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let _: Value = self
            .request(
                "updateNoteFields",
                Some(json!({ "note": { "id": id, "fields": fields } })),
            )
            .await?;
        Ok(())
    }
}

fn is_loopback(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]"))
}
