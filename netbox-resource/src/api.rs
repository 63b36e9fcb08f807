//! The capability the reconciliation engine needs from NetBox.
//!
//! The engine never talks HTTP itself; it is handed something that can
//! filter, create, update and delete objects of an [`Endpoint`].
//! [`crate::client::NetboxClient`] is the real implementation.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A NetBox REST collection, e.g. `dcim/virtual-chassis`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub app: &'static str,
    pub name: &'static str,
}

impl Endpoint {
    pub const fn new(app: &'static str, name: &'static str) -> Self {
        Endpoint { app, name }
    }

    /// Path of the collection, relative to the NetBox base URL.
    pub fn path(&self) -> String {
        format!("api/{}/{}/", self.app, self.name)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.name)
    }
}

/// The kind of request, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Filter parameters for a list request.
///
/// Keys may repeat, which NetBox treats as "any of" for most filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

#[async_trait]
pub trait NetboxApi: Send + Sync {
    /// All objects of `endpoint` matching `query`.
    async fn filter(&self, endpoint: Endpoint, query: &Query) -> Result<Vec<Value>>;

    async fn create(&self, endpoint: Endpoint, payload: &Map<String, Value>) -> Result<Value>;

    /// Partial update; only the given fields are sent.
    async fn update(
        &self,
        endpoint: Endpoint,
        id: u64,
        changes: &Map<String, Value>,
    ) -> Result<Value>;

    async fn delete(&self, endpoint: Endpoint, id: u64) -> Result<()>;
}

/// The numeric identity of a NetBox object.
pub fn object_id(endpoint: Endpoint, object: &Value) -> Result<u64> {
    object
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::UnexpectedResponse {
            endpoint: endpoint.to_string(),
            message: format!("object has no numeric id: {}", object),
        })
}

/// Render a scalar as a query parameter value.
pub fn query_value(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::validation(format!(
            "{} cannot be used to look up an object: {}",
            field, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_path() {
        let e = Endpoint::new("virtualization", "cluster-groups");
        assert_eq!(e.path(), "api/virtualization/cluster-groups/");
        assert_eq!(e.to_string(), "virtualization/cluster-groups");
    }

    #[test]
    fn query_display() {
        let mut q = Query::new();
        q.push("name", "VC 1");
        q.push("master_id", "5");
        assert_eq!(q.to_string(), "{name=VC 1, master_id=5}");
    }

    #[test]
    fn object_id_requires_number() {
        let e = Endpoint::new("dcim", "devices");
        assert_eq!(object_id(e, &json!({"id": 7})).unwrap(), 7);
        assert!(object_id(e, &json!({"id": "7"})).is_err());
    }

    #[test]
    fn query_value_rejects_structures() {
        assert_eq!(query_value("name", &json!("x")).unwrap(), "x");
        assert_eq!(query_value("vc_position", &json!(2)).unwrap(), "2");
        assert!(query_value("tags", &json!(["a"])).is_err());
    }
}
