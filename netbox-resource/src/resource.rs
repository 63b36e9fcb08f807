//! Resource-type descriptors.
//!
//! The reconciliation engine is written once, against [`ResourceType`]. Each
//! managed kind of NetBox object (cluster group, virtual chassis, ...) is a
//! zero-sized type implementing it.

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

use crate::api::Endpoint;
use crate::error::Result;

pub trait ResourceType: Send + Sync + 'static {
    /// Key of the object in the result document, and prefix of messages.
    const NAME: &'static str;

    /// The `data` section of the module arguments.
    ///
    /// Serializing it must produce the desired attributes; `None` fields
    /// should be skipped or serialize to `null`, which counts as "not
    /// mentioned".
    type Data: DeserializeOwned + Serialize + Debug + Send + Sync;

    fn endpoint() -> Endpoint;

    /// Fields that identify an object when no `query_params` are given.
    fn query_params() -> &'static [&'static str];

    /// Maximum slug length; `None` when the type has no slug.
    fn slug_max_len() -> Option<usize> {
        None
    }

    /// Fields whose values name other NetBox objects.
    fn references() -> &'static [Reference] {
        &[]
    }

    /// Checks that do not need NetBox, such as required identifying fields.
    fn validate(_data: &Self::Data) -> Result<()> {
        Ok(())
    }
}

/// A field whose value refers to an object of another endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    /// Field name in the desired state.
    pub field: &'static str,
    /// Where the referenced objects live.
    pub endpoint: Endpoint,
    /// Field matched when the reference is given as a plain string.
    pub lookup_key: &'static str,
    /// Filter parameter accepting the referenced object's id.
    pub filter_key: &'static str,
    /// Whether the field holds a list of references.
    pub many: bool,
}

pub const DEVICE: Reference = Reference {
    field: "device",
    endpoint: Endpoint::new("dcim", "devices"),
    lookup_key: "name",
    filter_key: "device_id",
    many: false,
};

pub const MASTER: Reference = Reference {
    field: "master",
    endpoint: Endpoint::new("dcim", "devices"),
    lookup_key: "name",
    filter_key: "master_id",
    many: false,
};

pub const SITE: Reference = Reference {
    field: "site",
    endpoint: Endpoint::new("dcim", "sites"),
    lookup_key: "slug",
    filter_key: "site_id",
    many: false,
};

pub const RACK: Reference = Reference {
    field: "rack",
    endpoint: Endpoint::new("dcim", "racks"),
    lookup_key: "name",
    filter_key: "rack_id",
    many: false,
};

pub const TENANT: Reference = Reference {
    field: "tenant",
    endpoint: Endpoint::new("tenancy", "tenants"),
    lookup_key: "slug",
    filter_key: "tenant_id",
    many: false,
};

pub const TAGS: Reference = Reference {
    field: "tags",
    endpoint: Endpoint::new("extras", "tags"),
    lookup_key: "name",
    filter_key: "tag_id",
    many: true,
};

const KNOWN: &[Reference] = &[DEVICE, MASTER, SITE, RACK, TENANT, TAGS];

/// The reference descriptor for a field appearing inside a nested lookup
/// mapping, e.g. `site` in `master: {name: sw1, site: dc-1}`.
pub fn known_reference(field: &str) -> Option<&'static Reference> {
    KNOWN.iter().find(|r| r.field == field)
}
