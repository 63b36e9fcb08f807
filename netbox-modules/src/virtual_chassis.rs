//! Virtual chassis (`dcim/virtual-chassis`).
//!
//! A virtual chassis is identified by its name, its master device, or both.
//! `master` may name the device, give its id, or be a mapping of device
//! filters such as `{name: sw1, site: dc-1}`.

use netbox_resource::api::Endpoint;
use netbox_resource::resource::{self, Reference, ResourceType};
use netbox_resource::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct VirtualChassis;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VirtualChassisData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Value>>,
}

impl ResourceType for VirtualChassis {
    const NAME: &'static str = "virtual_chassis";
    type Data = VirtualChassisData;

    fn endpoint() -> Endpoint {
        Endpoint::new("dcim", "virtual-chassis")
    }

    fn query_params() -> &'static [&'static str] {
        &["name", "master"]
    }

    fn references() -> &'static [Reference] {
        &[resource::MASTER, resource::TAGS]
    }

    fn validate(data: &Self::Data) -> Result<()> {
        let has_master = data.master.as_ref().is_some_and(|m| !m.is_null());
        if data.name.is_none() && !has_master {
            return Err(Error::validation(
                "virtual_chassis requires one of the following: name, master",
            ));
        }
        Ok(())
    }
}
