//! The container/image inventory queried by the `info` backend.
//!
//! [`ContainerInventory`] is the seam to a container runtime.
//! [`StaticInventory`] answers from memory and can be loaded from a JSON
//! fixture.

use crate::{config, config::ConfigError, HandlerError};
use futures::future::{ready, BoxFuture};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Container {
    pub id: String,
    /// The image as the runtime reports it, possibly wrapped as `<Image: 'ref'>`.
    pub image: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub status: String,
    pub name: String,
    pub short_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Image {
    pub id: String,
    pub tag: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    #[error("network error: {0}")]
    Network(String),
}

impl From<InventoryError> for HandlerError {
    fn from(e: InventoryError) -> Self {
        HandlerError::new(e.to_string())
    }
}

pub trait ContainerInventory: Send + Sync {
    fn get_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Container, InventoryError>>;

    fn get_image<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, Result<Image, InventoryError>>;

    fn get_registry_digest<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<String, InventoryError>>;
}

/// An inventory held in memory.
///
/// Containers are found by id, name or short id. Images and registry digests
/// are keyed by image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StaticInventory {
    #[serde(default)]
    containers: Vec<Container>,
    #[serde(default)]
    images: BTreeMap<String, Image>,
    #[serde(default)]
    digests: BTreeMap<String, String>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        config::load_json(path.as_ref())
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    pub fn with_image(mut self, reference: impl Into<String>, image: Image) -> Self {
        self.images.insert(reference.into(), image);
        self
    }

    pub fn with_digest(mut self, reference: impl Into<String>, digest: impl Into<String>) -> Self {
        self.digests.insert(reference.into(), digest.into());
        self
    }

    fn container(&self, id: &str) -> Result<Container, InventoryError> {
        self.containers
            .iter()
            .find(|c| c.id == id || c.name == id || c.short_id == id)
            .cloned()
            .ok_or_else(|| not_found("container", id))
    }

    fn image(&self, reference: &str) -> Result<Image, InventoryError> {
        self.images
            .get(reference)
            .cloned()
            .ok_or_else(|| not_found("image", reference))
    }

    fn digest(&self, reference: &str) -> Result<String, InventoryError> {
        self.digests
            .get(reference)
            .cloned()
            .ok_or_else(|| not_found("registry digest", reference))
    }
}

fn not_found(kind: &'static str, id: &str) -> InventoryError {
    InventoryError::NotFound {
        kind,
        id: id.to_owned(),
    }
}

impl ContainerInventory for StaticInventory {
    fn get_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Container, InventoryError>> {
        Box::pin(ready(self.container(id)))
    }

    fn get_image<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, Result<Image, InventoryError>> {
        Box::pin(ready(self.image(reference)))
    }

    fn get_registry_digest<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<String, InventoryError>> {
        Box::pin(ready(self.digest(reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> Container {
        Container {
            id: "4f2a9c".into(),
            image: "<Image: 'nginx:1.25'>".into(),
            labels: BTreeMap::new(),
            status: "running".into(),
            name: "web".into(),
            short_id: "4f2a".into(),
        }
    }

    #[tokio::test]
    async fn finds_container_by_any_identifier() {
        let inventory = StaticInventory::new().with_container(web());
        for key in ["4f2a9c", "web", "4f2a"] {
            assert_eq!(inventory.get_container(key).await.unwrap().name, "web");
        }
        assert_eq!(
            inventory.get_container("db").await,
            Err(InventoryError::NotFound {
                kind: "container",
                id: "db".into()
            })
        );
    }

    #[test]
    fn parses_fixture() {
        let fixture = r#"{
            "containers": [{"id": "c1", "image": "redis:7", "status": "exited",
                            "name": "cache", "short_id": "c1"}],
            "images": {"redis:7": {"id": "sha256:aa", "tag": "redis:7"}},
            "digests": {"redis:7": "sha256:bb"}
        }"#;
        let inventory: StaticInventory = serde_json::from_str(fixture).unwrap();
        assert_eq!(inventory.container("cache").unwrap().status, "exited");
        assert_eq!(inventory.image("redis:7").unwrap().id, "sha256:aa");
        assert_eq!(inventory.digest("redis:7").unwrap(), "sha256:bb");
    }
}
