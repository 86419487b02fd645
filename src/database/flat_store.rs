use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use super::store::{by_score_desc, cosine_similarity, Document, DocumentStore, ScoredDocument, StoreError};

/// In-process document store with a flat similarity scan.
///
/// Every query is O(n) in the number of stored documents, which is fine for a
/// few thousand documents. Larger corpora belong in an ANN-backed store such
/// as [`crate::database::QdrantStore`].
///
/// When opened with a path, every upsert is appended to a JSON Lines log which
/// is replayed on the next open. The log is written while the write lock is
/// held, so the order in the file is the order in memory.
pub struct FlatStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
    dimension: Option<usize>,
    log: Option<File>,
}

impl Inner {
    fn check_dimension(&self, actual: usize) -> Result<(), StoreError> {
        match self.dimension {
            Some(expected) if expected != actual => Err(StoreError::DimensionMismatch { expected, actual }),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, document: Document) {
        self.dimension.get_or_insert(document.embedding.len());
        match self.positions.get(&document.id) {
            Some(&position) => self.documents[position] = document,
            None => {
                self.positions.insert(document.id.clone(), self.documents.len());
                self.documents.push(document);
            }
        }
    }

    /// Replays one log line. Returns false when the line is unusable.
    fn replay(&mut self, line: &[u8], line_no: usize, path: &Path) -> bool {
        match serde_json::from_slice::<Document>(line) {
            Ok(document) => match self.check_dimension(document.embedding.len()) {
                Ok(()) => {
                    self.apply(document);
                    true
                }
                Err(e) => {
                    tracing::warn!("Skipping line {} of {}: {}", line_no, path.display(), e);
                    false
                }
            },
            Err(e) => {
                tracing::warn!("Skipping unreadable line {} of {}: {}", line_no, path.display(), e);
                false
            }
        }
    }

    fn append(&mut self, document: &Document) -> Result<(), StoreError> {
        if let Some(log) = self.log.as_mut() {
            let mut line = serde_json::to_vec(document)?;
            line.push(b'\n');
            log.write_all(&line)?;
        }
        Ok(())
    }
}

impl FlatStore {
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Opens (or creates) the log at `path` and replays it.
    ///
    /// A final line without a trailing newline is a write that was cut off.
    /// It is kept if it still parses, otherwise the file is truncated back to
    /// the last complete line so later appends start on a fresh line.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut log = OpenOptions::new().read(true).append(true).create(true).open(path)?;
        let mut contents = Vec::new();
        log.read_to_end(&mut contents)?;

        let complete = contents.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        let (body, tail) = contents.split_at(complete);

        let mut inner = Inner::default();
        let mut line_count = 0;
        for line in body.split(|&b| b == b'\n') {
            line_count += 1;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            inner.replay(line, line_count, path);
        }

        if !tail.iter().all(u8::is_ascii_whitespace) {
            if inner.replay(tail, line_count, path) {
                log.write_all(b"\n")?;
            } else {
                tracing::warn!("Truncating torn write at the end of {}", path.display());
                log.set_len(complete as u64)?;
            }
        } else if !tail.is_empty() {
            log.write_all(b"\n")?;
        }

        tracing::info!("Loaded {} documents from {}", inner.documents.len(), path.display());
        inner.log = Some(log);

        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    fn upsert_sync(&self, document: Document) -> Result<(), StoreError> {
        if document.embedding.is_empty() {
            return Err(StoreError::EmptyEmbedding(document.id));
        }

        let mut inner = self.inner.write();
        inner.check_dimension(document.embedding.len())?;
        inner.append(&document)?;
        inner.apply(document);
        Ok(())
    }

    fn search_sync(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        let inner = self.inner.read();
        if inner.documents.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        inner.check_dimension(query.len())?;

        let mut scored: Vec<(usize, f32)> = inner
            .documents
            .iter()
            .enumerate()
            .map(|(position, doc)| (position, cosine_similarity(query, &doc.embedding)))
            .collect();

        // stable: equal scores stay in insertion order
        scored.sort_by(|a, b| by_score_desc(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| {
                let doc = &inner.documents[position];
                ScoredDocument {
                    id: doc.id.clone(),
                    text: doc.text.clone(),
                    score,
                }
            })
            .collect())
    }
}

#[async_trait]
impl DocumentStore for FlatStore {
    async fn upsert(&self, document: Document) -> Result<(), StoreError> {
        self.upsert_sync(document)
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>, StoreError> {
        self.search_sync(query, k)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn doc(id: &str, embedding: Vec<f32>) -> Document {
        Document {
            id: id.to_string(),
            text: format!("text of {}", id),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = FlatStore::in_memory();
        let results = store.similarity_search(&[1.0, 0.0], 1).await.unwrap();
        assert!(results.is_empty());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_top_k_ordering() {
        let store = FlatStore::in_memory();
        store.upsert(doc("a", vec![0.0, 1.0])).await.unwrap();
        store.upsert(doc("b", vec![1.0, 0.1])).await.unwrap();
        store.upsert(doc("c", vec![1.0, 1.0])).await.unwrap();

        let results = store.similarity_search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_ties_resolve_to_first_inserted() {
        let store = FlatStore::in_memory();
        store.upsert(doc("first", vec![1.0, 1.0])).await.unwrap();
        store.upsert(doc("second", vec![2.0, 2.0])).await.unwrap();

        let results = store.similarity_search(&[3.0, 3.0], 1).await.unwrap();
        assert_eq!(results[0].id, "first");
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let store = FlatStore::in_memory();
        store.upsert(doc("a", vec![1.0, 0.0])).await.unwrap();
        store.upsert(doc("b", vec![1.0, 0.0])).await.unwrap();
        store
            .upsert(Document {
                id: "a".to_string(),
                text: "updated".to_string(),
                embedding: vec![1.0, 0.0],
            })
            .await
            .unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        let results = store.similarity_search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].id, "a");
        assert_eq!(results[0].text, "updated");
    }

    #[tokio::test]
    async fn test_dimension_is_fixed_by_first_document() {
        let store = FlatStore::in_memory();
        store.upsert(doc("a", vec![1.0, 0.0, 0.0])).await.unwrap();

        let err = store.upsert(doc("b", vec![1.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 3, actual: 2 }));

        let err = store.similarity_search(&[1.0], 1).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_empty_embedding_rejected() {
        let store = FlatStore::in_memory();
        let err = store.upsert(doc("a", vec![])).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyEmbedding(_)));
    }

    #[tokio::test]
    async fn test_log_replay_keeps_order_and_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");

        {
            let store = FlatStore::open(&path).unwrap();
            store.upsert(doc("a", vec![1.0, 1.0])).await.unwrap();
            store.upsert(doc("b", vec![1.0, 1.0])).await.unwrap();
            store
                .upsert(Document {
                    id: "a".to_string(),
                    text: "a again".to_string(),
                    embedding: vec![1.0, 1.0],
                })
                .await
                .unwrap();
        }

        let reopened = FlatStore::open(&path).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
        let results = reopened.similarity_search(&[1.0, 1.0], 2).await.unwrap();
        assert_eq!(results[0].id, "a");
        assert_eq!(results[0].text, "a again");
        assert_eq!(results[1].id, "b");
    }

    #[tokio::test]
    async fn test_torn_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");
        {
            let store = FlatStore::open(&path).unwrap();
            store.upsert(doc("a", vec![1.0, 0.0])).await.unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"id\":\"b\",\"text\":\"trunc").unwrap();
        drop(file);

        {
            let reopened = FlatStore::open(&path).unwrap();
            assert_eq!(reopened.len().await.unwrap(), 1);
            reopened.upsert(doc("c", vec![0.0, 1.0])).await.unwrap();
        }

        let again = FlatStore::open(&path).unwrap();
        assert_eq!(again.len().await.unwrap(), 2);
        let results = again.similarity_search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].id, "c");
        assert!(!std::fs::read_to_string(&path).unwrap().contains("trunc"));
    }

    #[tokio::test]
    async fn test_complete_line_without_newline_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");
        let line = serde_json::to_string(&doc("a", vec![1.0, 0.0])).unwrap();
        std::fs::write(&path, line).unwrap();

        {
            let store = FlatStore::open(&path).unwrap();
            assert_eq!(store.len().await.unwrap(), 1);
            store.upsert(doc("b", vec![0.0, 1.0])).await.unwrap();
        }

        let reopened = FlatStore::open(&path).unwrap();
        assert_eq!(reopened.len().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends() {
        let store = Arc::new(FlatStore::in_memory());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.upsert(doc(&format!("doc-{}", i), vec![i as f32, 1.0])).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.len().await.unwrap(), 32);
    }
}
