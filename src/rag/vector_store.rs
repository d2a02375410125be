use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    PointId, PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
};
use qdrant_client::Qdrant;
use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

use crate::error::{RagError, Result};
use crate::models::Document;

/// Metadata key holding the document text, shared with the indexer.
pub const TEXT_KEY: &str = "text";

/// Qdrant payload key keeping the caller's id, since point ids must be UUIDs.
const DOCUMENT_ID_KEY: &str = "document_id";

/// A remote similarity index bound to an existing collection.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn similarity_search(&self, vector: Vec<f32>, k: u64) -> Result<Vec<Document>>;

    /// Inserts or replaces documents; returns how many were written.
    async fn upsert(&self, items: Vec<(Document, Vec<f32>)>) -> Result<usize>;
}

/// Splits stored metadata into document text and remaining fields.
pub(crate) fn split_text(mut metadata: JsonMap<String, JsonValue>) -> Option<(String, JsonValue)> {
    let text = match metadata.remove(TEXT_KEY)? {
        JsonValue::String(s) => s,
        _ => return None,
    };
    Some((text, JsonValue::Object(metadata)))
}

/// Merges document text back into its metadata for storage.
pub(crate) fn merge_text(doc: &Document) -> JsonMap<String, JsonValue> {
    let mut map = match &doc.metadata {
        JsonValue::Object(m) => m.clone(),
        _ => JsonMap::new(),
    };
    map.insert(TEXT_KEY.to_string(), JsonValue::String(doc.page_content.clone()));
    map
}

pub struct QdrantIndex {
    client: Qdrant,
    collection_name: String,
}

impl QdrantIndex {
    /// Connects to an existing collection; never creates one.
    pub async fn connect(url: &str, api_key: Option<String>, collection_name: &str) -> Result<Self> {
        tracing::info!("Building Qdrant client for URL: {}", url);
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .build()
            .map_err(|e| RagError::VectorStore(format!("Qdrant client build failed: {}", e)))?;

        let exists = client
            .collection_exists(collection_name)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        if !exists {
            return Err(RagError::VectorStore(format!(
                "collection `{}` does not exist",
                collection_name
            )));
        }
        tracing::info!("Qdrant collection `{}` ready", collection_name);

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
        })
    }

    // Qdrant only accepts UUID or integer point ids.
    fn point_id(id: &str) -> String {
        match Uuid::parse_str(id) {
            Ok(uuid) => uuid.to_string(),
            Err(_) => Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string(),
        }
    }
}

fn qdrant_to_json(value: QdrantValue) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(b)) => JsonValue::Bool(b),
        Some(Kind::IntegerValue(i)) => JsonValue::from(i),
        Some(Kind::DoubleValue(d)) => JsonValue::from(d),
        Some(Kind::StringValue(s)) => JsonValue::String(s),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(qdrant_to_json).collect())
        }
        Some(Kind::StructValue(st)) => JsonValue::Object(payload_to_json(st.fields)),
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> JsonMap<String, JsonValue> {
    payload
        .into_iter()
        .map(|(key, value)| (key, qdrant_to_json(value)))
        .collect()
}

fn point_id_string(id: Option<PointId>) -> Option<String> {
    match id?.point_id_options? {
        PointIdOptions::Uuid(uuid) => Some(uuid),
        PointIdOptions::Num(num) => Some(num.to_string()),
    }
}

/// Maps a search hit to a document; hits without a text payload are skipped.
fn scored_point_to_document(point: ScoredPoint) -> Option<Document> {
    let mut payload = payload_to_json(point.payload);
    let stored_id = match payload.remove(DOCUMENT_ID_KEY) {
        Some(JsonValue::String(id)) => Some(id),
        _ => None,
    };
    let (text, metadata) = split_text(payload)?;

    Some(Document {
        id: stored_id.or_else(|| point_id_string(point.id)),
        page_content: text,
        metadata,
        score: Some(point.score),
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn similarity_search(&self, vector: Vec<f32>, k: u64) -> Result<Vec<Document>> {
        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, vector, k).with_payload(true),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        let results = search_result
            .result
            .into_iter()
            .filter_map(scored_point_to_document)
            .collect();

        Ok(results)
    }

    async fn upsert(&self, items: Vec<(Document, Vec<f32>)>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let points: Vec<PointStruct> = items
            .into_iter()
            .map(|(doc, embedding)| {
                let id = doc
                    .id
                    .as_deref()
                    .map(Self::point_id)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                let mut payload = merge_text(&doc);
                if let Some(doc_id) = &doc.id {
                    payload.insert(DOCUMENT_ID_KEY.to_string(), JsonValue::String(doc_id.clone()));
                }
                PointStruct::new(id, embedding, payload)
            })
            .collect();
        let count = points.len();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(count)
    }
}
