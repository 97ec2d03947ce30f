//! `info`: container and image attributes for a set of hosts.

use crate::{
    call,
    inventory::{Container, ContainerInventory, Image, InventoryError},
    name,
    types::{Decode, DecodeError},
    Dispatcher, HandlerError, RpcFunction, Value,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

/// The first `info` argument: `(hosts, ips, ports)`.
///
/// Only `hosts` drives the lookup; the address fields are checked for shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub hosts: Vec<String>,
    pub ips: Vec<Vec<i64>>,
    pub ports: Vec<i64>,
}

impl Decode for Endpoints {
    fn decode(val: Value) -> Result<Self, DecodeError> {
        let (hosts, ips, Ports(ports)) = <(Vec<String>, Vec<Vec<i64>>, Ports)>::decode(val)?;
        Ok(Endpoints { hosts, ips, ports })
    }
}

/// Ports travel as a tuple of any length.
struct Ports(Vec<i64>);

impl Decode for Ports {
    fn decode(val: Value) -> Result<Self, DecodeError> {
        // Same element checks as a list, once the tuple is unwrapped.
        let ports = Vec::<i64>::decode(Value::List(val.into_tuple()?))?;
        Ok(Ports(ports))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerAttribute {
    Id,
    Image,
    Labels,
    Status,
    Name,
    ShortId,
}

impl ContainerAttribute {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "id" => Self::Id,
            "image" => Self::Image,
            "labels" => Self::Labels,
            "status" => Self::Status,
            "name" => Self::Name,
            "short_id" => Self::ShortId,
            _ => return None,
        })
    }

    fn extract(self, container: &Container) -> String {
        match self {
            Self::Id => container.id.clone(),
            Self::Image => container.image.clone(),
            Self::Labels => render_labels(&container.labels),
            Self::Status => container.status.clone(),
            Self::Name => container.name.clone(),
            Self::ShortId => container.short_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageAttribute {
    Id,
    Tag,
    Labels,
}

impl ImageAttribute {
    fn extract(self, image: &Image) -> String {
        match self {
            ImageAttribute::Id => image.id.clone(),
            ImageAttribute::Tag => image.tag.clone(),
            ImageAttribute::Labels => render_labels(&image.labels),
        }
    }
}

/// What to look up for each host, validated before any lookup happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Query {
    Container(ContainerAttribute),
    Image(ImageAttribute),
    /// The registry digest of the container's image.
    Digest,
}

impl Query {
    fn parse(kind: &str, attribute: &str) -> Result<Self, HandlerError> {
        let query = match kind {
            "container" => ContainerAttribute::parse(attribute).map(Query::Container),
            "image" => match attribute {
                "id" => Some(Query::Image(ImageAttribute::Id)),
                "tag" => Some(Query::Image(ImageAttribute::Tag)),
                "labels" => Some(Query::Image(ImageAttribute::Labels)),
                "digest" => Some(Query::Digest),
                _ => None,
            },
            _ => return Err(HandlerError::new(format!("unsupported kind `{kind}`"))),
        };
        query.ok_or_else(|| {
            HandlerError::new(format!(
                "unsupported attribute `{attribute}` for kind `{kind}`"
            ))
        })
    }

    async fn lookup(
        self,
        inventory: &dyn ContainerInventory,
        host: &str,
    ) -> Result<String, InventoryError> {
        let container = inventory.get_container(host).await?;
        match self {
            Query::Container(attribute) => Ok(attribute.extract(&container)),
            Query::Image(attribute) => {
                let image = inventory.get_image(bare_image_ref(&container.image)).await?;
                Ok(attribute.extract(&image))
            }
            Query::Digest => {
                inventory
                    .get_registry_digest(bare_image_ref(&container.image))
                    .await
            }
        }
    }
}

/// Strips the runtime's `<Image: 'ref'>` decoration. With several tags the
/// first one wins; an undecorated reference comes back unchanged.
pub fn bare_image_ref(image: &str) -> &str {
    let inner = image
        .strip_prefix("<Image: ")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(image);
    let first = inner.split(", ").next().unwrap_or(inner);
    first.trim_matches('\'')
}

fn render_labels(labels: &BTreeMap<String, String>) -> String {
    serde_json::to_string(labels).unwrap_or_default()
}

/// `info((hosts, ips, ports), kind, attribute)` answers one string per host,
/// in host order. Any failed lookup fails the whole call.
pub struct Info {
    inventory: Arc<dyn ContainerInventory>,
}

impl Info {
    pub fn new(inventory: Arc<dyn ContainerInventory>) -> Self {
        Self { inventory }
    }
}

impl RpcFunction for Info {
    name!("info");
    call! {
        async fn call(&self, (endpoints, kind, attribute): (Endpoints, String, String)) -> Vec<String> {
            let query = Query::parse(&kind, &attribute)?;
            debug!(hosts = endpoints.hosts.len(), ?query, "inventory query");
            let mut values = Vec::with_capacity(endpoints.hosts.len());
            for host in &endpoints.hosts {
                values.push(query.lookup(self.inventory.as_ref(), host).await?);
            }
            Ok(values)
        }
    }
}

pub fn dispatcher(inventory: Arc<dyn ContainerInventory>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.add(Info::new(inventory));
    dispatcher
}
