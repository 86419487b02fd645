use qdrant_client::{config::QdrantConfig, Qdrant};
use std::time::Duration;

use super::store::StoreError;

/// Normalises a Qdrant URL to the gRPC endpoint the client talks to.
/// `localhost:6333` (REST) becomes `http://localhost:6334` (gRPC). An explicit
/// scheme is kept; a bare host defaults to `http`.
pub fn grpc_url(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("http", url));
    let host = rest.trim_end_matches('/');

    match host.strip_suffix(":6333") {
        Some(host) => format!("{}://{}:6334", scheme, host),
        None => format!("{}://{}", scheme, host),
    }
}

pub async fn create_qdrant_client(url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Qdrant, StoreError> {
    let url_with_scheme = grpc_url(url);
    tracing::info!("Attempting to connect to Qdrant with URL: {}", url_with_scheme);

    let mut config = QdrantConfig::from_url(&url_with_scheme);
    config.api_key = api_key.map(str::to_string);
    config.check_compatibility = false;
    config.timeout = timeout;
    config.connect_timeout = Duration::from_secs(10);

    let client = Qdrant::new(config).map_err(|e| StoreError::Backend(e.to_string()))?;

    // Test the connection
    match client.list_collections().await {
        Ok(_) => {
            tracing::info!("Successfully connected to Qdrant");
            Ok(client)
        }
        Err(e) => {
            tracing::error!("Qdrant connection test failed: {}", e);
            Err(StoreError::Backend(format!("Failed to connect to Qdrant: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grpc_url() {
        assert_eq!(grpc_url("http://localhost:6333"), "http://localhost:6334");
        assert_eq!(grpc_url("localhost:6333/"), "http://localhost:6334");
        assert_eq!(grpc_url("http://qdrant.internal:7000"), "http://qdrant.internal:7000");
        assert_eq!(grpc_url("https://qdrant.internal:7000"), "https://qdrant.internal:7000");
        assert_eq!(grpc_url("https://cloud.qdrant.io:6333/"), "https://cloud.qdrant.io:6334");
    }
}
