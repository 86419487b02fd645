pub mod database;
pub mod flat_store;
pub mod qdrant_config;
pub mod store;
pub mod vector_db;

pub use database::{Database, DatabaseError, Report};
pub use flat_store::FlatStore;
pub use store::{cosine_similarity, Document, DocumentStore, ScoredDocument, StoreError};
pub use vector_db::QdrantStore;
