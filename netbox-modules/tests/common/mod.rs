use netbox_modules::{ClusterGroup, VirtualChassis};
use netbox_resource::config::ModuleArgs;
use netbox_resource::framework;
use netbox_resource::reconcile::ModuleResult;
use netbox_resource::resource::{self, ResourceType};
use netbox_resource::testing::{Call, MemoryNetbox};
use serde_json::{json, Value};

/// A NetBox with two devices named `sw1` (on different sites) and one named
/// `Test Device`, plus a few tags.
pub fn netbox() -> MemoryNetbox {
    let nb = MemoryNetbox::new();
    nb.insert(resource::SITE.endpoint, json!({"id": 1, "name": "DC 1", "slug": "dc-1"}));
    nb.insert(resource::SITE.endpoint, json!({"id": 2, "name": "DC 2", "slug": "dc-2"}));
    nb.insert(
        resource::DEVICE.endpoint,
        json!({"id": 10, "name": "sw1", "site": {"id": 1, "slug": "dc-1"}}),
    );
    nb.insert(
        resource::DEVICE.endpoint,
        json!({"id": 11, "name": "sw1", "site": {"id": 2, "slug": "dc-2"}}),
    );
    nb.insert(
        resource::DEVICE.endpoint,
        json!({"id": 12, "name": "Test Device", "site": {"id": 1, "slug": "dc-1"}}),
    );
    nb.insert(resource::TAGS.endpoint, json!({"id": 100, "name": "blue", "slug": "blue"}));
    nb.insert(resource::TAGS.endpoint, json!({"id": 101, "name": "green", "slug": "green"}));
    nb
}

pub fn args<R: ResourceType>(document: Value) -> ModuleArgs<R::Data> {
    let mut document = document;
    document["netbox_url"] = json!("http://netbox.local");
    document["netbox_token"] = json!("thisIsMyToken");
    framework::parse_args::<R>(&document.to_string()).unwrap()
}

pub async fn run<R: ResourceType>(nb: &MemoryNetbox, document: Value) -> anyhow::Result<ModuleResult> {
    framework::apply::<R, _>(nb, args::<R>(document), false).await
}

pub async fn cluster_group(nb: &MemoryNetbox, document: Value) -> anyhow::Result<ModuleResult> {
    run::<ClusterGroup>(nb, document).await
}

pub async fn virtual_chassis(nb: &MemoryNetbox, document: Value) -> anyhow::Result<ModuleResult> {
    run::<VirtualChassis>(nb, document).await
}

pub fn mutations(nb: &MemoryNetbox) -> Vec<Call> {
    nb.calls().into_iter().filter(Call::is_mutation).collect()
}
