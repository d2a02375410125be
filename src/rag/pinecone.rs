use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::vector_store::{merge_text, split_text, VectorIndex};
use crate::error::{RagError, Result};
use crate::models::Document;

const API_VERSION: &str = "2024-07";
const UPSERT_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: Vec<f32>,
    top_k: u64,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
struct Match {
    id: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    metadata: Option<JsonMap<String, JsonValue>>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<Vector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Vector {
    id: String,
    values: Vec<f32>,
    metadata: JsonMap<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

/// Handle on an existing Pinecone serverless/pod index.
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    host: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    /// Binds to a known data-plane host without contacting the control plane.
    pub fn with_host(api_key: impl Into<String>, host: &str, namespace: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            host: normalize_host(host),
            namespace,
        }
    }

    /// Looks up `index_name` through the control plane and binds to its host.
    /// Fails when the index does not exist or its dimension does not match.
    pub async fn connect(
        controller_url: &str,
        api_key: &str,
        index_name: &str,
        namespace: Option<String>,
        expected_dimension: usize,
    ) -> Result<Self> {
        let client = Client::new();
        let url = format!("{}/indexes/{}", controller_url.trim_end_matches('/'), index_name);
        tracing::info!("Describing Pinecone index `{}`", index_name);

        let response = client
            .get(&url)
            .header("Api-Key", api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::VectorStore(format!(
                "index `{}` is not available: {} - {}",
                index_name, status, error_text
            )));
        }

        let description: IndexDescription = response.json().await?;
        if let Some(dimension) = description.dimension {
            if dimension != expected_dimension {
                return Err(RagError::VectorStore(format!(
                    "index `{}` has dimension {} but the embedding model produces {}",
                    index_name, dimension, expected_dimension
                )));
            }
        }

        tracing::info!("Pinecone index `{}` ready at {}", index_name, description.host);
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            host: normalize_host(&description.host),
            namespace,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RagError::VectorStore(format!(
                "Pinecone {} failed: {} - {}",
                path, status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn similarity_search(&self, vector: Vec<f32>, k: u64) -> Result<Vec<Document>> {
        let request = QueryRequest {
            vector,
            top_k: k,
            include_metadata: true,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };
        let response: QueryResponse = self.post("/query", &request).await?;

        let docs = response
            .matches
            .into_iter()
            .filter_map(|m| {
                let (text, metadata) = split_text(m.metadata.unwrap_or_default())?;
                Some(Document {
                    id: Some(m.id),
                    page_content: text,
                    metadata,
                    score: m.score,
                })
            })
            .collect();

        Ok(docs)
    }

    async fn upsert(&self, items: Vec<(Document, Vec<f32>)>) -> Result<usize> {
        let vectors: Vec<Vector> = items
            .into_iter()
            .map(|(doc, values)| Vector {
                id: doc
                    .id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                metadata: merge_text(&doc),
                values,
            })
            .collect();

        let mut total = 0;
        let mut vectors = vectors.into_iter().peekable();
        while vectors.peek().is_some() {
            let batch: Vec<Vector> = vectors.by_ref().take(UPSERT_BATCH).collect();
            let request = UpsertRequest {
                vectors: batch,
                namespace: self.namespace.as_deref(),
            };
            let response: UpsertResponse = self.post("/vectors/upsert", &request).await?;
            total += response.upserted_count;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    #[derive(Default)]
    struct Recorded {
        queries: Vec<JsonValue>,
        upserted: usize,
        upsert_calls: usize,
    }

    type Shared = Arc<Mutex<Recorded>>;

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("api-key").and_then(|v| v.to_str().ok()) == Some("pc-test")
    }

    async fn describe(
        Path(name): Path<String>,
        headers: HeaderMap,
    ) -> Result<Json<JsonValue>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        if name != "medical-chatbot" {
            return Err(StatusCode::NOT_FOUND);
        }
        Ok(Json(json!({
            "name": name,
            "dimension": 384,
            "metric": "cosine",
            "host": "medical-chatbot-abc123.svc.pinecone.io",
            "status": {"ready": true, "state": "Ready"}
        })))
    }

    async fn query(
        State(rec): State<Shared>,
        headers: HeaderMap,
        Json(body): Json<JsonValue>,
    ) -> Result<Json<JsonValue>, StatusCode> {
        if !authorized(&headers) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let top_k = body["topK"].as_u64().unwrap_or(0) as usize;
        rec.lock().unwrap().queries.push(body);
        let matches: Vec<JsonValue> = (0..top_k)
            .map(|i| {
                json!({
                    "id": format!("doc-{}", i),
                    "score": 0.9 - i as f64 * 0.1,
                    "metadata": {"text": format!("snippet {}", i), "source": "gale.pdf"}
                })
            })
            .chain(std::iter::once(json!({"id": "no-text", "score": 0.1, "metadata": {"source": "x"}})))
            .collect();
        Ok(Json(json!({"matches": matches, "namespace": ""})))
    }

    async fn upsert(State(rec): State<Shared>, Json(body): Json<JsonValue>) -> Json<JsonValue> {
        let n = body["vectors"].as_array().map(|v| v.len()).unwrap_or(0);
        let mut rec = rec.lock().unwrap();
        rec.upserted += n;
        rec.upsert_calls += 1;
        Json(json!({"upsertedCount": n}))
    }

    async fn spawn_mock() -> (String, Shared) {
        let rec: Shared = Arc::default();
        let app = Router::new()
            .route("/indexes/:name", get(describe))
            .route("/query", post(query))
            .route("/vectors/upsert", post(upsert))
            .with_state(rec.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), rec)
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("idx.svc.pinecone.io"), "https://idx.svc.pinecone.io");
        assert_eq!(normalize_host("http://127.0.0.1:9/"), "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn test_connect_resolves_host() {
        let (url, _) = spawn_mock().await;
        let index = PineconeIndex::connect(&url, "pc-test", "medical-chatbot", None, 384)
            .await
            .unwrap();
        assert_eq!(index.host(), "https://medical-chatbot-abc123.svc.pinecone.io");
    }

    #[tokio::test]
    async fn test_connect_missing_index_fails() {
        let (url, _) = spawn_mock().await;
        let err = PineconeIndex::connect(&url, "pc-test", "other-index", None, 384)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_connect_rejects_dimension_mismatch() {
        let (url, _) = spawn_mock().await;
        let result = PineconeIndex::connect(&url, "pc-test", "medical-chatbot", None, 768).await;
        assert!(matches!(result, Err(RagError::VectorStore(_))));
    }

    #[tokio::test]
    async fn test_query_returns_top_k_documents() {
        let (url, rec) = spawn_mock().await;
        let index = PineconeIndex::with_host("pc-test", &url, Some("books".into()));

        let docs = index.similarity_search(vec![0.1; 384], 3).await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].page_content, "snippet 0");
        assert_eq!(docs[0].id.as_deref(), Some("doc-0"));
        assert_eq!(docs[0].metadata, json!({"source": "gale.pdf"}));

        let rec = rec.lock().unwrap();
        assert_eq!(rec.queries[0]["topK"], 3);
        assert_eq!(rec.queries[0]["includeMetadata"], true);
        assert_eq!(rec.queries[0]["namespace"], "books");
    }

    #[tokio::test]
    async fn test_query_with_bad_key_is_error() {
        let (url, _) = spawn_mock().await;
        let index = PineconeIndex::with_host("wrong", &url, None);
        let err = index.similarity_search(vec![0.0; 384], 3).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_upsert_batches() {
        let (url, rec) = spawn_mock().await;
        let index = PineconeIndex::with_host("pc-test", &url, None);
        let items: Vec<(Document, Vec<f32>)> = (0..250)
            .map(|i| (Document::new(format!("chunk {}", i)).with_id(format!("id_{}", i)), vec![0.0; 4]))
            .collect();

        let written = index.upsert(items).await.unwrap();
        assert_eq!(written, 250);
        let rec = rec.lock().unwrap();
        assert_eq!(rec.upsert_calls, 3);
        assert_eq!(rec.upserted, 250);
    }
}
