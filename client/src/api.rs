//! Remote entity CRUD API collaborator.
//!
//! The orchestrator drains the pending-operation queue against this API.
//! Every call is retry-safe: the server deduplicates by the client-supplied
//! entity id, so replaying an acknowledged-but-unrecorded call is harmless.

use crate::error::Result;
use async_trait::async_trait;
use tether_engine::Entity;

/// The remote entity CRUD API the queue is drained against.
#[async_trait]
pub trait EntityApi: Send + Sync {
    /// `POST /entities/{kind}` - create an entity.
    ///
    /// Returns the stored entity, which may carry a server-assigned id
    /// replacing a temporary client-generated one.
    async fn create(&self, entity: &Entity) -> Result<Entity>;

    /// `PUT /entities/{kind}/{id}` - update an entity.
    ///
    /// Returns the stored entity with any server-assigned fields (e.g. a
    /// bumped revision).
    async fn update(&self, entity: &Entity) -> Result<Entity>;

    /// `DELETE /entities/{kind}/{id}` - delete an entity.
    async fn delete(&self, entity_kind: &str, entity_id: &str) -> Result<()>;
}

/// HTTP implementation of [`EntityApi`].
pub struct HttpEntityApi {
    client: reqwest::Client,
    base_url: String,
    credential: String,
}

impl HttpEntityApi {
    /// Create a client for the given API base URL and bearer credential.
    pub fn new(base_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            credential: credential.into(),
        }
    }
}

#[async_trait]
impl EntityApi for HttpEntityApi {
    async fn create(&self, entity: &Entity) -> Result<Entity> {
        let url = format!("{}/entities/{}", self.base_url, entity.kind());

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.credential)
            .json(entity)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn update(&self, entity: &Entity) -> Result<Entity> {
        let url = format!(
            "{}/entities/{}/{}",
            self.base_url,
            entity.kind(),
            entity.id
        );

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.credential)
            .json(entity)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn delete(&self, entity_kind: &str, entity_id: &str) -> Result<()> {
        let url = format!("{}/entities/{}/{}", self.base_url, entity_kind, entity_id);

        self.client
            .delete(url)
            .bearer_auth(&self.credential)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
