//! Domain methods for the admin API client.
//!
//! Uploads go straight through [`ApiClient::send`]. Resource reads are served
//! from the [`QueryCache`](crate::QueryCache) when possible; mutations
//! invalidate the tags the cached reads depend on.

use bazaar_core::{ListQuery, Page, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use validator::Validate;

use crate::{ApiClient, ClientError, MultipartFile, RequestSpec, Tag};

impl ApiClient {
    /// Upload one file to the upload endpoint and return its URL.
    pub async fn upload_file(&self, file: MultipartFile) -> Result<String, ClientError> {
        let file_name = file.file_name.clone();
        let size = file.bytes.len();
        let url: String = self
            .post_multipart(&self.endpoint(&self.config().upload_path), file)
            .await?;

        tracing::debug!(file_name = %file_name, size, url = %url, "File uploaded");
        Ok(url)
    }

    /// Upload a file read from disk.
    pub async fn upload_from_disk(&self, path: &std::path::Path) -> Result<String, ClientError> {
        if path
            .components()
            .any(|c| c == std::path::Component::ParentDir)
        {
            return Err(ClientError::InvalidInput(format!(
                "Invalid path: {}",
                path.display()
            )));
        }
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::InvalidInput(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin");

        self.upload_file(MultipartFile::new(file_name, bytes)).await
    }

    fn collection_path(&self, resource: Resource) -> String {
        self.endpoint(&format!("/{}", resource.path_segment()))
    }

    fn record_path(&self, resource: Resource, id: &str) -> String {
        self.endpoint(&format!("/{}/{}", resource.path_segment(), id))
    }

    /// Cached GET returning the envelope's data as raw JSON.
    async fn cached_get(
        &self,
        spec: RequestSpec,
        tags: Vec<Tag>,
    ) -> Result<serde_json::Value, ClientError> {
        let key = spec.cache_key();
        if let Some(value) = self.cache().get(&key) {
            return Ok(value);
        }

        let generation = self.cache().generation();
        let value: serde_json::Value = self.send(&spec).await?.into_data()?;
        self.cache()
            .insert_if_current(key, value.clone(), tags, generation);
        Ok(value)
    }

    /// List one page of a collection.
    pub async fn list_records<T: DeserializeOwned>(
        &self,
        resource: Resource,
        query: &ListQuery,
    ) -> Result<Page<T>, ClientError> {
        query.validate()?;

        let spec = RequestSpec::get(self.collection_path(resource)).query(query.to_query_pairs());
        let value = self.cached_get(spec, vec![Tag::list(resource)]).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch a single record by ID.
    pub async fn get_record<T: DeserializeOwned>(
        &self,
        resource: Resource,
        id: &str,
    ) -> Result<T, ClientError> {
        let spec = RequestSpec::get(self.record_path(resource, id));
        let value = self
            .cached_get(spec, vec![Tag::record(resource, id)])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Create a record; invalidates the collection's list queries.
    pub async fn create_record<T: DeserializeOwned, B: Serialize>(
        &self,
        resource: Resource,
        body: &B,
    ) -> Result<T, ClientError> {
        let created = self.post_json(&self.collection_path(resource), body).await?;
        self.cache().invalidate(&[Tag::list(resource)]);
        tracing::info!(resource = %resource, "Record created");
        Ok(created)
    }

    /// Replace a record; invalidates list queries and the record itself.
    pub async fn update_record<T: DeserializeOwned, B: Serialize>(
        &self,
        resource: Resource,
        id: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let updated = self.put_json(&self.record_path(resource, id), body).await?;
        self.cache()
            .invalidate(&[Tag::list(resource), Tag::record(resource, id)]);
        tracing::info!(resource = %resource, id, "Record updated");
        Ok(updated)
    }

    /// Delete a record; invalidates list queries and the record itself.
    pub async fn delete_record(&self, resource: Resource, id: &str) -> Result<(), ClientError> {
        self.delete(&self.record_path(resource, id)).await?;
        self.cache()
            .invalidate(&[Tag::list(resource), Tag::record(resource, id)]);
        tracing::info!(resource = %resource, id, "Record deleted");
        Ok(())
    }
}
