//! Cluster groups (`virtualization/cluster-groups`).

use netbox_resource::api::Endpoint;
use netbox_resource::resource::ResourceType;
use netbox_resource::{Error, Result};
use serde::{Deserialize, Serialize};

pub struct ClusterGroup;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterGroupData {
    pub name: String,
    /// Derived from `name` when not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl ResourceType for ClusterGroup {
    const NAME: &'static str = "cluster_group";
    type Data = ClusterGroupData;

    fn endpoint() -> Endpoint {
        Endpoint::new("virtualization", "cluster-groups")
    }

    fn query_params() -> &'static [&'static str] {
        &["slug"]
    }

    fn slug_max_len() -> Option<usize> {
        Some(100)
    }

    fn validate(data: &Self::Data) -> Result<()> {
        if data.name.trim().is_empty() {
            return Err(Error::validation("cluster_group name must not be empty"));
        }
        Ok(())
    }
}
