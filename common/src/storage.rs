// Object storage client and descriptor retrieval

use crate::config::StorageConfig;
use crate::errors::FetchError;
use crate::event::ObjectLocation;
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tracing::{debug, error, info, instrument};

/// Read access to object storage, keyed by resolved location.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError>;
}

/// Object storage client backed by an S3-compatible endpoint. Authenticates
/// with explicitly configured keys when present, otherwise with the ambient
/// credential chain of the execution environment.
#[derive(Clone, Debug)]
pub struct BlobStoreClient {
    endpoint: String,
    region: String,
    credentials: Credentials,
}

impl BlobStoreClient {
    #[instrument(skip(config), fields(endpoint = %config.endpoint))]
    pub fn new(config: &StorageConfig) -> Result<Self, FetchError> {
        info!("Initializing object storage client");

        // Strip scheme as Region::Custom does not expect it
        let endpoint = config
            .endpoint
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();

        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            }
            // Ambient credential chain (environment, profile, instance metadata)
            _ => Credentials::default(),
        }
        .map_err(|e| {
            error!(error = %e, "Failed to build storage credentials");
            FetchError::Client(format!("Failed to build credentials: {}", e))
        })?;

        Ok(Self {
            endpoint,
            region: config.region.clone(),
            credentials,
        })
    }

    /// Build a bucket handle for the container named by the event. The
    /// container is event-scoped, so the handle is constructed per call.
    fn bucket_for(&self, container: &str) -> Result<Bucket, FetchError> {
        let region = Region::Custom {
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
        };

        let bucket = Bucket::new(container, region, self.credentials.clone())
            .map_err(|e| {
                error!(error = %e, container = %container, "Failed to create bucket handle");
                FetchError::Client(format!("Failed to create bucket handle: {}", e))
            })?
            .with_path_style();

        Ok(bucket)
    }
}

#[async_trait]
impl ObjectStore for BlobStoreClient {
    #[instrument(skip(self), fields(container = %location.container, path = %location.relative_path))]
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError> {
        let bucket = self.bucket_for(&location.container)?;

        let response = bucket
            .get_object(&location.relative_path)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to retrieve object");
                FetchError::Transport(location.relative_path.clone(), e.to_string())
            })?;

        let data = response.bytes().to_vec();
        debug!(size = data.len(), "Object retrieved");
        Ok(data)
    }
}

/// Fetch the object referenced by `location` and decode it as JSON.
///
/// All three location fields must be non-empty; a partially specified
/// location is a contract violation and fails fast. Transport and parse
/// failures are logged before propagating, never swallowed.
#[instrument(skip(store, location), fields(container = %location.container, path = %location.relative_path))]
pub async fn fetch_json_object(
    store: &dyn ObjectStore,
    location: &ObjectLocation,
) -> Result<serde_json::Value, FetchError> {
    if location.service_endpoint.is_empty() {
        error!("Aborting object fetch: service endpoint is missing");
        return Err(FetchError::MissingArgument("service_endpoint"));
    }
    if location.container.is_empty() {
        error!("Aborting object fetch: container is missing");
        return Err(FetchError::MissingArgument("container"));
    }
    if location.relative_path.is_empty() {
        error!("Aborting object fetch: relative path is missing");
        return Err(FetchError::MissingArgument("relative_path"));
    }

    info!("Beginning download of JSON object");

    let bytes = store.get_object(location).await?;

    let json = serde_json::from_slice(&bytes).map_err(|e| {
        error!(error = %e, "Downloaded object is not valid JSON");
        FetchError::InvalidJson(location.relative_path.clone(), e.to_string())
    })?;

    info!(size = bytes.len(), "Concluded download of JSON object");
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapStore {
        objects: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl ObjectStore for MapStore {
        async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, FetchError> {
            let key = format!("{}/{}", location.container, location.relative_path);
            self.objects
                .get(&key)
                .cloned()
                .ok_or_else(|| FetchError::Transport(key, "not found".to_string()))
        }
    }

    fn location(container: &str, path: &str) -> ObjectLocation {
        ObjectLocation {
            service_endpoint: "https://example.net".to_string(),
            container: container.to_string(),
            relative_path: path.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_decodes_json() {
        let store = MapStore {
            objects: HashMap::from([(
                "demo/in.json".to_string(),
                br#"{"sql_statement_to_execute":"SELECT 1"}"#.to_vec(),
            )]),
        };
        let json = fetch_json_object(&store, &location("demo", "in.json"))
            .await
            .unwrap();
        assert_eq!(json["sql_statement_to_execute"], "SELECT 1");
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_location_fields() {
        let store = MapStore {
            objects: HashMap::new(),
        };
        let err = fetch_json_object(&store, &location("", "in.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingArgument("container")));

        let err = fetch_json_object(&store, &location("demo", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingArgument("relative_path")));
    }

    #[tokio::test]
    async fn test_fetch_wraps_invalid_json() {
        let store = MapStore {
            objects: HashMap::from([("demo/in.json".to_string(), b"not json".to_vec())]),
        };
        let err = fetch_json_object(&store, &location("demo", "in.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidJson(_, _)));
    }

    #[tokio::test]
    async fn test_fetch_propagates_transport_errors() {
        let store = MapStore {
            objects: HashMap::new(),
        };
        let err = fetch_json_object(&store, &location("demo", "missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_, _)));
    }
}
