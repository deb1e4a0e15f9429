//! REST client for a Fedora-style object repository
//!
//! | Operation        | Request                                                     |
//! |------------------|-------------------------------------------------------------|
//! | allocate         | `POST /objects/new` (body: new pid)                         |
//! | add relationship | `POST /objects/{pid}/relationships/new?subject&predicate&object` |
//! | attach content   | `GET /objects/{pid}/datastreams/{ds}?format=xml`, then `PUT` or `POST` |
//! | fetch content    | `GET /objects/{pid}/datastreams/{ds}/content`               |
//! | purge            | `DELETE /objects/{pid}`                                     |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{object_uri, ObjectRepository};
use crate::config::RepositoryConfig;
use crate::error::{IngestError, Result};

/// Content type attached streams are stored under.
const STREAM_MIME_TYPE: &str = "text/xml";

pub struct RestRepository {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl RestRepository {
    pub fn new(config: &RepositoryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::repository(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn objects_url(&self) -> String {
        format!("{}/objects", self.base_url)
    }

    fn object_url(&self, object_id: &str) -> String {
        format!("{}/objects/{}", self.base_url, object_id)
    }

    fn stream_url(&self, object_id: &str, stream_id: &str) -> String {
        format!("{}/objects/{}/datastreams/{}", self.base_url, object_id, stream_id)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| IngestError::repository(format!("{} failed: {}", what, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IngestError::repository_not_found(what));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::repository(format!(
                "{} failed with {}: {}",
                what,
                status,
                body.trim()
            )));
        }
        Ok(response)
    }

    async fn stream_exists(&self, object_id: &str, stream_id: &str) -> Result<bool> {
        let request = self
            .client
            .get(self.stream_url(object_id, stream_id))
            .query(&[("format", "xml")]);

        match self.send(request, "stream lookup").await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ObjectRepository for RestRepository {
    #[instrument(skip(self))]
    async fn allocate_object(&self) -> Result<String> {
        let request = self.client.post(format!("{}/new", self.objects_url()));
        let response = self.send(request, "object allocation").await?;

        let pid = response
            .text()
            .await
            .map_err(|e| IngestError::repository(format!("Failed to read allocated id: {}", e)))?
            .trim()
            .to_string();

        if pid.is_empty() {
            return Err(IngestError::repository("Repository returned an empty object id"));
        }

        info!("Allocated repository object {}", pid);
        Ok(pid)
    }

    #[instrument(skip(self))]
    async fn add_relationship(&self, object_id: &str, predicate: &str, target: &str) -> Result<()> {
        let subject = object_uri(object_id);
        let request = self
            .client
            .post(format!("{}/relationships/new", self.object_url(object_id)))
            .query(&[
                ("subject", subject.as_str()),
                ("predicate", predicate),
                ("object", target),
            ]);

        self.send(request, "relationship creation").await?;
        debug!("Added {} {} {}", object_id, predicate, target);
        Ok(())
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn attach_content(&self, object_id: &str, stream_id: &str, bytes: Vec<u8>) -> Result<()> {
        let url = self.stream_url(object_id, stream_id);

        let request = if self.stream_exists(object_id, stream_id).await? {
            debug!("Replacing stream {} of {}", stream_id, object_id);
            self.client.put(&url)
        } else {
            debug!("Creating stream {} of {}", stream_id, object_id);
            self.client
                .post(&url)
                .query(&[("controlGroup", "M"), ("dsLabel", stream_id)])
        };

        let request = request
            .query(&[("mimeType", STREAM_MIME_TYPE)])
            .header(reqwest::header::CONTENT_TYPE, STREAM_MIME_TYPE)
            .body(bytes);

        self.send(request, "stream upload").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_content(&self, object_id: &str, stream_id: &str) -> Result<Vec<u8>> {
        let request = self
            .client
            .get(format!("{}/content", self.stream_url(object_id, stream_id)));

        let response = self
            .send(request, &format!("stream {} of {}", stream_id, object_id))
            .await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IngestError::repository(format!("Failed to read stream body: {}", e)))?;

        Ok(bytes.to_vec())
    }

    #[instrument(skip(self))]
    async fn purge_object(&self, object_id: &str) -> Result<()> {
        let request = self.client.delete(self.object_url(object_id));
        self.send(request, &format!("object {}", object_id)).await?;
        info!("Purged repository object {}", object_id);
        Ok(())
    }
}
