//! Finding the one existing object a desired state describes.

use serde_json::{Map, Value};
use tracing::debug;

use crate::api::{query_value, Endpoint, NetboxApi, Query};
use crate::error::{Error, Result};
use crate::resource::Reference;

/// Check user supplied `query_params` against the submitted `data` keys,
/// before anything is sent to NetBox.
pub fn validate_query_params(
    resource: &str,
    desired: &Map<String, Value>,
    query_params: &[String],
) -> Result<()> {
    let invalid: Vec<&str> = query_params
        .iter()
        .filter(|p| !desired.contains_key(p.as_str()))
        .map(String::as_str)
        .collect();
    if invalid.is_empty() {
        return Ok(());
    }
    let acceptable: Vec<&str> = desired.keys().map(String::as_str).collect();
    Err(Error::validation(format!(
        "one or more query_params are invalid for {}: {}; acceptable: {}",
        resource,
        invalid.join(", "),
        acceptable.join(", ")
    )))
}

/// Build the filter identifying the object: the uniqueness fields present in
/// the (already resolved) desired state.
///
/// Reference fields are sent under their id filter, e.g. `master_id`.
pub fn build_query(
    resource: &str,
    fields: &[&str],
    references: &[Reference],
    desired: &Map<String, Value>,
) -> Result<Query> {
    let mut query = Query::new();
    for field in fields {
        let Some(value) = desired.get(*field) else {
            continue;
        };
        match references.iter().find(|r| r.field == *field) {
            Some(reference) => match value {
                Value::Array(ids) => {
                    for id in ids {
                        query.push(reference.filter_key, query_value(field, id)?);
                    }
                }
                id => query.push(reference.filter_key, query_value(field, id)?),
            },
            None => query.push(*field, query_value(field, value)?),
        }
    }
    if query.is_empty() {
        return Err(Error::validation(format!(
            "cannot identify {}: none of {} is set",
            resource,
            fields.join(", ")
        )));
    }
    Ok(query)
}

/// Query NetBox for the object; more than one match is an error.
pub async fn find<A: NetboxApi + ?Sized>(
    api: &A,
    resource: &str,
    endpoint: Endpoint,
    query: &Query,
) -> Result<Option<Value>> {
    debug!(resource, %endpoint, %query, "looking up existing object");
    let mut matches = api.filter(endpoint, query).await?;
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        n => {
            debug!(resource, count = n, "lookup is ambiguous");
            Err(Error::AmbiguousMatch {
                resource: resource.to_string(),
                query: query.to_string(),
            })
        }
    }
}
