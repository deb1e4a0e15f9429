//! S3-backed content store
//!
//! Each space maps to a bucket named `<bucket_prefix><space_id>`; content ids
//! are used as object keys unchanged. Content properties are the object's
//! user metadata plus `content-size` from the object length.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    Client,
};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use super::{Content, ContentProperties, ContentStore, CONTENT_SIZE};
use crate::config::S3Config;
use crate::error::{IngestError, Result};

#[derive(Clone)]
pub struct S3ContentStore {
    client: Client,
    config: S3Config,
}

impl S3ContentStore {
    pub fn new(config: S3Config) -> Self {
        debug!("Initializing content store with endpoint: {:?}", config.endpoint);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "arca-content-store",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "Content store client initialized (bucket prefix: {:?})",
            config.bucket_prefix
        );

        Self { client, config }
    }

    fn bucket(&self, space_id: &str) -> String {
        self.config.bucket_for(space_id)
    }
}

fn properties_from(metadata: Option<&HashMap<String, String>>, length: Option<i64>) -> ContentProperties {
    let mut properties: ContentProperties = metadata.cloned().unwrap_or_default().into();
    if let Some(length) = length {
        properties.insert(CONTENT_SIZE, length.to_string());
    }
    properties
}

/// `bucket/key` with the key percent-encoded; content ids carry `:` and `+`.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, urlencoding::encode(key))
}

#[async_trait]
impl ContentStore for S3ContentStore {
    #[instrument(skip(self))]
    async fn get_content(&self, space_id: &str, content_id: &str) -> Result<Content> {
        let bucket = self.bucket(space_id);
        debug!("Downloading s3://{}/{}", bucket, content_id);

        let response = self
            .client
            .get_object()
            .bucket(&bucket)
            .key(content_id)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    IngestError::store_not_found(space_id, content_id)
                } else {
                    IngestError::store(space_id, content_id, DisplayErrorContext(&e).to_string())
                }
            })?;

        let properties = properties_from(response.metadata(), response.content_length());

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| IngestError::store(space_id, content_id, format!("Failed to read body: {}", e)))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", bytes.len(), bucket, content_id);

        Ok(Content { bytes, properties })
    }

    #[instrument(skip(self))]
    async fn get_content_properties(
        &self,
        space_id: &str,
        content_id: &str,
    ) -> Result<ContentProperties> {
        let response = self
            .client
            .head_object()
            .bucket(self.bucket(space_id))
            .key(content_id)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    IngestError::store_not_found(space_id, content_id)
                } else {
                    IngestError::store(space_id, content_id, DisplayErrorContext(&e).to_string())
                }
            })?;

        Ok(properties_from(response.metadata(), response.content_length()))
    }

    #[instrument(skip(self))]
    async fn copy_content(
        &self,
        source_space_id: &str,
        source_content_id: &str,
        dest_space_id: &str,
        dest_content_id: &str,
    ) -> Result<()> {
        let source = copy_source(&self.bucket(source_space_id), source_content_id);
        let dest_bucket = self.bucket(dest_space_id);

        debug!("Copying {} to s3://{}/{}", source, dest_bucket, dest_content_id);

        self.client
            .copy_object()
            .bucket(&dest_bucket)
            .copy_source(&source)
            .key(dest_content_id)
            .send()
            .await
            .map_err(|e| {
                IngestError::store(
                    source_space_id,
                    source_content_id,
                    format!("Failed to copy to {}: {}", dest_space_id, DisplayErrorContext(&e)),
                )
            })?;

        info!(
            "Copied {}/{} to {}/{}",
            source_space_id, source_content_id, dest_space_id, dest_content_id
        );

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_content(&self, space_id: &str, content_id: &str) -> Result<()> {
        let bucket = self.bucket(space_id);
        debug!("Deleting s3://{}/{}", bucket, content_id);

        self.client
            .delete_object()
            .bucket(&bucket)
            .key(content_id)
            .send()
            .await
            .map_err(|e| IngestError::store(space_id, content_id, DisplayErrorContext(&e).to_string()))?;

        info!("Deleted {}/{}", space_id, content_id);

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_encodes_key() {
        assert_eq!(
            copy_source("virginiastaging", "demo:1+DS1+DS1.0"),
            "virginiastaging/demo%3A1%2BDS1%2BDS1.0"
        );
    }

    #[test]
    fn test_bucket_prefix() {
        let mut config = S3Config::for_minio("http://localhost:9000");
        config.bucket_prefix = "arca-".to_string();
        let store = S3ContentStore::new(config);
        assert_eq!(store.bucket("virginia"), "arca-virginia");
    }

    #[test]
    fn test_properties_from_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("tags".to_string(), "ingest_manifest".to_string());

        let properties = properties_from(Some(&metadata), Some(512));
        assert_eq!(properties.size(), Some(512));
        assert!(properties.has_tag("ingest_manifest"));

        assert_eq!(properties_from(None, None), ContentProperties::new());
    }
}
