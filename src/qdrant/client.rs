//! HTTP client wrapper for interacting with Qdrant.

use crate::artifact::ArtifactKind;
use crate::index::{SummaryHit, SummaryPoint, VectorStore, VectorStoreError};
use crate::qdrant::{
    filters::build_kind_filter,
    payload::{DOC_ID_KEY, KIND_KEY, build_payload, map_scored_point},
    types::{QdrantError, QueryResponse, QueryResponseResult, ScoredPoint},
};
use crate::timestamp::now_rfc3339;
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client for the Qdrant instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("rusty-rag/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Create a cosine collection of `vector_size` dimensions with keyword indexes on the
    /// join and kind keys. Existing collections are left untouched.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            return Ok(());
        }

        let body = json!({ "vectors": { "size": vector_size, "distance": "Cosine" } });
        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        tracing::info!(collection = collection_name, vector_size, "Created summary collection");

        for field in [DOC_ID_KEY, KIND_KEY] {
            let body = json!({ "field_name": field, "field_schema": "keyword" });
            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))
                .json(&body)
                .send()
                .await?;
            if response.status() == StatusCode::CONFLICT {
                continue;
            }
            // Filtering still works without the index, only slower.
            if let Err(error) = check_status(response).await {
                tracing::warn!(collection = collection_name, field, %error, "Payload index not created");
            }
        }
        Ok(())
    }

    /// Upload summary vectors, waiting until the write is applied.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<SummaryPoint>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let now = now_rfc3339();
        let serialized: Vec<_> = points
            .iter()
            .map(|point| {
                json!({
                    "id": point.point_id,
                    "vector": point.vector,
                    "payload": build_payload(point, &now),
                })
            })
            .collect();
        let point_count = serialized.len();

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;
        check_status(response).await?;
        tracing::debug!(collection = collection_name, points = point_count, "Summary points written");
        Ok(point_count)
    }

    /// Delete points by id, waiting until the removal is applied.
    pub async fn delete_points(
        &self,
        collection_name: &str,
        point_ids: &[String],
    ) -> Result<(), QdrantError> {
        if point_ids.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::POST, &format!("collections/{collection_name}/points/delete"))
            .query(&[("wait", true)])
            .json(&json!({ "points": point_ids }))
            .send()
            .await?;
        check_status(response).await?;
        tracing::debug!(collection = collection_name, points = point_ids.len(), "Summary points deleted");
        Ok(())
    }

    /// Nearest summaries to `vector`, optionally restricted by a payload filter.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let (Some(filter_value), Some(object)) = (filter, body.as_object_mut()) {
            object.insert("filter".into(), filter_value);
        }

        let response = self
            .request(Method::POST, &format!("collections/{collection_name}/points/query"))
            .json(&body)
            .send()
            .await?;
        let payload: QueryResponse = check_status(response).await?.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) | QueryResponseResult::Object { points } => points,
        };
        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect())
    }

    /// Whether Qdrant knows the collection.
    pub async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await.map(|_| true)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            req = req.header("api-key", api_key);
        }
        req
    }
}

/// Pass successful responses through; turn anything else into [`QdrantError::UnexpectedStatus`].
async fn check_status(response: Response) -> Result<Response, QdrantError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let error = QdrantError::UnexpectedStatus { status, body };
    tracing::error!(path = %url, %error, "Qdrant request failed");
    Err(error)
}

#[async_trait]
impl VectorStore for QdrantService {
    async fn collection_exists(&self, collection: &str) -> Result<bool, VectorStoreError> {
        Ok(QdrantService::collection_exists(self, collection).await?)
    }

    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<(), VectorStoreError> {
        Ok(self
            .create_collection_if_not_exists(collection, vector_size as u64)
            .await?)
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<SummaryPoint>,
    ) -> Result<usize, VectorStoreError> {
        Ok(self.upsert_points(collection, points).await?)
    }

    async fn delete_points(
        &self,
        collection: &str,
        point_ids: &[String],
    ) -> Result<(), VectorStoreError> {
        Ok(QdrantService::delete_points(self, collection, point_ids).await?)
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
        kind: Option<ArtifactKind>,
    ) -> Result<Vec<SummaryHit>, VectorStoreError> {
        let hits = self
            .search_points(collection, vector, build_kind_filter(kind), limit)
            .await?;
        Ok(hits.into_iter().map(map_scored_point).collect())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn service(server: &MockServer) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("rusty-rag-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        }
    }

    #[tokio::test]
    async fn search_emits_kind_filter_and_maps_payload() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/pdf-abc/points/query")
                    .json_body_partial(
                        r#"{"limit":3,"filter":{"must":[{"key":"kind","match":{"value":"text"}}]}}"#,
                    );
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
                                "score": 0.42,
                                "payload": {
                                    "doc_id": "doc-1",
                                    "kind": "text",
                                    "summary": "Paris is the capital"
                                }
                            }
                        ]
                    }
                }));
            })
            .await;

        let hits = VectorStore::search(
            &service(&server),
            "pdf-abc",
            vec![0.1, 0.2],
            3,
            Some(ArtifactKind::Text),
        )
        .await
        .expect("search request");

        mock.assert();
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.point_id, "7c9e6679-7425-40de-944b-e07fc1f90ae7");
        assert!((hit.score - 0.42).abs() < f32::EPSILON);
        assert_eq!(hit.doc_id.as_deref(), Some("doc-1"));
        assert_eq!(hit.kind, Some(ArtifactKind::Text));
    }

    #[tokio::test]
    async fn ensure_collection_skips_existing() {
        let server = MockServer::start_async().await;
        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/pdf-abc");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/pdf-abc");
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;

        VectorStore::ensure_collection(&service(&server), "pdf-abc", 384)
            .await
            .expect("ensure");
        exists.assert();
        create.assert_hits(0);
    }

    #[tokio::test]
    async fn ensure_collection_creates_missing_with_indexes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/pdf-new");
                then.status(404).body("not found");
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/pdf-new")
                    .json_body(json!({ "vectors": { "size": 8, "distance": "Cosine" } }));
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;
        let indexes = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/pdf-new/index");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;

        VectorStore::ensure_collection(&service(&server), "pdf-new", 8)
            .await
            .expect("ensure");
        create.assert();
        indexes.assert_hits(2);
    }

    #[tokio::test]
    async fn upsert_waits_and_reports_count() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/pdf-abc/points")
                    .query_param("wait", "true")
                    .body_contains("\"doc_id\":\"doc-1\"");
                then.status(200).json_body(json!({ "result": { "status": "completed" } }));
            })
            .await;

        let inserted = service(&server)
            .upsert_points(
                "pdf-abc",
                vec![SummaryPoint {
                    point_id: "7c9e6679-7425-40de-944b-e07fc1f90ae7".into(),
                    vector: vec![0.5, 0.5],
                    doc_id: "doc-1".into(),
                    kind: ArtifactKind::Image,
                    summary: "A bar chart".into(),
                }],
            )
            .await
            .expect("upsert");

        mock.assert();
        assert_eq!(inserted, 1);
    }

    #[tokio::test]
    async fn delete_points_posts_ids_and_waits() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/pdf-abc/points/delete")
                    .query_param("wait", "true")
                    .json_body(json!({ "points": ["p-1", "p-2"] }));
                then.status(200).json_body(json!({ "result": { "status": "completed" } }));
            })
            .await;

        VectorStore::delete_points(
            &service(&server),
            "pdf-abc",
            &["p-1".to_string(), "p-2".to_string()],
        )
        .await
        .expect("delete");
        mock.assert();
    }

    #[tokio::test]
    async fn missing_collection_reports_false() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/pdf-missing");
                then.status(404).body("not found");
            })
            .await;

        let exists = service(&server)
            .collection_exists("pdf-missing")
            .await
            .expect("status");
        assert!(!exists);
    }
}
