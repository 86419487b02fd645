use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, value::Kind, with_payload_selector::SelectorOptions, CountPoints,
        CreateCollection, Distance, GetPoints, PointId, PointStruct, SearchPoints, UpsertPoints, Value,
        VectorParams, VectorsConfig, WithPayloadSelector,
    },
    Qdrant,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

use super::qdrant_config::create_qdrant_client;
use super::store::{by_score_desc, Document, DocumentStore, ScoredDocument, StoreError};

/// Extra hits fetched beyond `k` so score ties can be re-ordered by insertion
/// sequence on our side. Qdrant itself gives no ordering guarantee for ties.
const TIE_WINDOW: u64 = 8;

/// [`DocumentStore`] backed by a Qdrant collection using cosine distance.
///
/// Point ids are UUIDv5 of the document id, so storing an id twice upserts.
/// The first-insertion sequence number is kept in the `seq` payload field.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    ready: AtomicBool,
}

fn point_id(id: &str) -> PointId {
    PointId {
        point_id_options: Some(PointIdOptions::Uuid(
            Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes()).to_string(),
        )),
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(i)) => Some(*i),
        _ => None,
    }
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl QdrantStore {
    pub async fn connect(
        url: &str,
        api_key: Option<&str>,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = create_qdrant_client(url, api_key, timeout).await?;
        Ok(Self {
            client,
            collection: collection.to_string(),
            ready: AtomicBool::new(false),
        })
    }

    async fn collection_ready(&self) -> Result<bool, StoreError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(true);
        }
        let exists = self.client.collection_exists(&self.collection).await.map_err(backend)?;
        if exists {
            self.ready.store(true, Ordering::Release);
        }
        Ok(exists)
    }

    async fn ensure_collection(&self, vector_size: usize) -> Result<(), StoreError> {
        if self.collection_ready().await? {
            return Ok(());
        }

        let vectors_config = VectorsConfig {
            config: Some(qdrant_client::qdrant::vectors_config::Config::Params(VectorParams {
                size: vector_size as u64,
                distance: Distance::Cosine.into(),
                ..Default::default()
            })),
        };

        let create_collection = CreateCollection {
            collection_name: self.collection.clone(),
            vectors_config: Some(vectors_config),
            ..Default::default()
        };

        match self.client.create_collection(create_collection).await {
            Ok(_) => tracing::info!("Created collection {} ({} dimensions)", self.collection, vector_size),
            Err(e) if e.to_string().contains("already exists") => {
                tracing::info!("Collection {} already exists, skipping creation", self.collection);
            }
            Err(e) => return Err(backend(e)),
        }

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn existing_seq(&self, id: &str) -> Result<Option<i64>, StoreError> {
        let request = GetPoints {
            collection_name: self.collection.clone(),
            ids: vec![point_id(id)],
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let response = self.client.get_points(request).await.map_err(backend)?;
        Ok(response
            .result
            .first()
            .and_then(|point| payload_int(&point.payload, "seq")))
    }
}

#[async_trait]
impl DocumentStore for QdrantStore {
    async fn upsert(&self, document: Document) -> Result<(), StoreError> {
        if document.embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding(document.id));
        }
        self.ensure_collection(document.embedding.len()).await?;

        let seq = match self.existing_seq(&document.id).await? {
            Some(seq) => seq,
            None => chrono::Utc::now().timestamp_micros(),
        };

        let mut payload = HashMap::new();
        payload.insert("id".to_string(), Value::from(document.id.clone()));
        payload.insert("text".to_string(), Value::from(document.text));
        payload.insert("seq".to_string(), Value::from(seq));

        let point = PointStruct {
            id: Some(point_id(&document.id)),
            vectors: Some(document.embedding.into()),
            payload,
        };

        let upsert_points = UpsertPoints {
            collection_name: self.collection.clone(),
            points: vec![point],
            wait: Some(true),
            ..Default::default()
        };

        self.client.upsert_points(upsert_points).await.map_err(backend)?;
        Ok(())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        if k == 0 || !self.collection_ready().await? {
            return Ok(Vec::new());
        }

        let request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: query.to_vec(),
            limit: k as u64 + TIE_WINDOW,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let results = self.client.search_points(request).await.map_err(backend)?;

        let mut hits: Vec<(i64, ScoredDocument)> = results
            .result
            .into_iter()
            .filter_map(|point| {
                let id = payload_str(&point.payload, "id")?;
                let text = payload_str(&point.payload, "text").unwrap_or_default();
                let seq = payload_int(&point.payload, "seq").unwrap_or(i64::MAX);
                Some((seq, ScoredDocument { id, text, score: point.score }))
            })
            .collect();

        hits.sort_by(|a, b| by_score_desc(a.1.score, b.1.score).then(a.0.cmp(&b.0)));
        hits.truncate(k);

        Ok(hits.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        if !self.collection_ready().await? {
            return Ok(0);
        }

        let request = CountPoints {
            collection_name: self.collection.clone(),
            exact: Some(true),
            ..Default::default()
        };

        let response = self.client.count(request).await.map_err(backend)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }
}
