//! Turning names of related objects into NetBox ids.
//!
//! Users write `master: Test Device`; NetBox wants `master: 12`. A reference
//! may be given as
//!
//! - an integer, taken as the id itself,
//! - a string, matched against the reference's lookup key,
//! - a mapping of filter fields, whose own reference fields are resolved
//!   first (depth first),
//! - a list of any of the above, for fields like `tags`.
//!
//! Every lookup must match exactly one object.

use futures_util::future::{BoxFuture, FutureExt as _};
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::{object_id, query_value, NetboxApi, Query};
use crate::error::{Error, ResolutionFailure, Result};
use crate::resource::{known_reference, Reference};

pub struct Resolver<'a, A: ?Sized> {
    api: &'a A,
}

impl<'a, A: NetboxApi + ?Sized> Resolver<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Resolver { api }
    }

    /// Replace every reference field present in `desired` with the id(s) it
    /// refers to.
    pub async fn resolve_all(
        &self,
        references: &[Reference],
        desired: &mut Map<String, Value>,
    ) -> Result<()> {
        for reference in references {
            let Some(value) = desired.get(reference.field) else {
                continue;
            };
            let resolved = self.resolve(reference, value).await?;
            desired.insert(reference.field.to_string(), resolved);
        }
        Ok(())
    }

    /// Resolve a single field value; lists yield lists of ids.
    pub fn resolve<'b>(
        &'b self,
        reference: &'b Reference,
        value: &'b Value,
    ) -> BoxFuture<'b, Result<Value>> {
        async move {
            match value {
                Value::Array(items) if reference.many => {
                    let mut ids = Vec::with_capacity(items.len());
                    for item in items {
                        ids.push(self.resolve_one(reference, item).await?);
                    }
                    Ok(Value::Array(ids))
                }
                Value::Array(_) => Err(Error::validation(format!(
                    "{} refers to a single object and cannot be a list",
                    reference.field
                ))),
                _ if reference.many => Err(Error::validation(format!(
                    "{} must be a list",
                    reference.field
                ))),
                _ => self.resolve_one(reference, value).await,
            }
        }
        .boxed()
    }

    async fn resolve_one(&self, reference: &Reference, value: &Value) -> Result<Value> {
        let query = match value {
            Value::Number(n) => {
                return n.as_u64().map(Value::from).ok_or_else(|| {
                    Error::validation(format!(
                        "{} id must be a positive integer, got {}",
                        reference.field, n
                    ))
                });
            }
            Value::String(s) => {
                let mut query = Query::new();
                query.push(reference.lookup_key, s.as_str());
                query
            }
            Value::Object(fields) => self.nested_query(reference, fields).await?,
            _ => {
                return Err(Error::validation(format!(
                    "{} must be a name, an id or a mapping of lookup fields, got {}",
                    reference.field, value
                )));
            }
        };

        debug!(field = reference.field, endpoint = %reference.endpoint, %query, "resolving reference");
        let matches = self.api.filter(reference.endpoint, &query).await?;
        match matches.as_slice() {
            [only] => Ok(Value::from(object_id(reference.endpoint, only)?)),
            [] => Err(Error::Resolution {
                field: reference.field.to_string(),
                value: value.to_string(),
                reason: ResolutionFailure::NotFound,
            }),
            _ => Err(Error::Resolution {
                field: reference.field.to_string(),
                value: value.to_string(),
                reason: ResolutionFailure::Ambiguous,
            }),
        }
    }

    async fn nested_query(&self, reference: &Reference, fields: &Map<String, Value>) -> Result<Query> {
        if fields.is_empty() {
            return Err(Error::validation(format!(
                "{} lookup mapping must not be empty",
                reference.field
            )));
        }
        let mut query = Query::new();
        for (key, value) in fields {
            match known_reference(key) {
                Some(nested) => match self.resolve(nested, value).await? {
                    Value::Array(ids) => {
                        for id in ids {
                            query.push(nested.filter_key, id.to_string());
                        }
                    }
                    id => query.push(nested.filter_key, id.to_string()),
                },
                None => query.push(key.as_str(), query_value(key, value)?),
            }
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{MASTER, TAGS};
    use crate::testing::MemoryNetbox;
    use serde_json::json;

    fn netbox() -> MemoryNetbox {
        let nb = MemoryNetbox::new();
        nb.insert(
            crate::resource::SITE.endpoint,
            json!({"id": 1, "name": "DC 1", "slug": "dc-1"}),
        );
        nb.insert(
            crate::resource::SITE.endpoint,
            json!({"id": 2, "name": "DC 2", "slug": "dc-2"}),
        );
        nb.insert(
            MASTER.endpoint,
            json!({"id": 10, "name": "sw1", "site": {"id": 1, "slug": "dc-1"}}),
        );
        nb.insert(
            MASTER.endpoint,
            json!({"id": 11, "name": "sw1", "site": {"id": 2, "slug": "dc-2"}}),
        );
        nb.insert(MASTER.endpoint, json!({"id": 12, "name": "Test Device"}));
        nb.insert(TAGS.endpoint, json!({"id": 100, "name": "blue", "slug": "blue"}));
        nb.insert(TAGS.endpoint, json!({"id": 101, "name": "green", "slug": "green"}));
        nb
    }

    #[tokio::test]
    async fn resolves_name() {
        let nb = netbox();
        let resolver = Resolver::new(&nb);
        let id = resolver.resolve(&MASTER, &json!("Test Device")).await.unwrap();
        assert_eq!(id, json!(12));
    }

    #[tokio::test]
    async fn id_is_taken_as_is() {
        let nb = netbox();
        let resolver = Resolver::new(&nb);
        assert_eq!(resolver.resolve(&MASTER, &json!(99)).await.unwrap(), json!(99));
        assert!(nb.calls().is_empty());
    }

    #[tokio::test]
    async fn ambiguous_name_fails() {
        let nb = netbox();
        let resolver = Resolver::new(&nb);
        let err = resolver.resolve(&MASTER, &json!("sw1")).await.unwrap_err();
        assert!(err.is_ambiguous(), "{}", err);
    }

    #[tokio::test]
    async fn missing_name_fails() {
        let nb = netbox();
        let resolver = Resolver::new(&nb);
        let err = resolver.resolve(&MASTER, &json!("nope")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Resolution {
                reason: ResolutionFailure::NotFound,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn nested_mapping_resolves_depth_first() {
        let nb = netbox();
        let resolver = Resolver::new(&nb);
        let id = resolver
            .resolve(&MASTER, &json!({"name": "sw1", "site": "dc-2"}))
            .await
            .unwrap();
        assert_eq!(id, json!(11));
    }

    #[tokio::test]
    async fn tags_resolve_to_id_list() {
        let nb = netbox();
        let resolver = Resolver::new(&nb);
        let ids = resolver
            .resolve(&TAGS, &json!(["green", {"slug": "blue"}, 101]))
            .await
            .unwrap();
        assert_eq!(ids, json!([101, 100, 101]));
    }

    #[tokio::test]
    async fn resolve_all_only_touches_reference_fields() {
        let nb = netbox();
        let resolver = Resolver::new(&nb);
        let mut desired = json!({"master": "Test Device", "domain": "Domain Text"})
            .as_object()
            .cloned()
            .unwrap();
        resolver.resolve_all(&[MASTER, TAGS], &mut desired).await.unwrap();
        assert_eq!(
            Value::Object(desired),
            json!({"master": 12, "domain": "Domain Text"})
        );
    }

    #[tokio::test]
    async fn shape_errors() {
        let nb = netbox();
        let resolver = Resolver::new(&nb);
        assert!(resolver.resolve(&TAGS, &json!("blue")).await.is_err());
        assert!(resolver.resolve(&MASTER, &json!(["sw1"])).await.is_err());
        assert!(resolver.resolve(&MASTER, &json!({})).await.is_err());
        assert!(resolver.resolve(&MASTER, &json!(true)).await.is_err());
    }
}
