//! An in-memory [`NetboxApi`] that records every call.
//!
//! Filters follow NetBox conventions closely enough for tests: `field=value`
//! matches scalars, `<field>_id=N` matches a nested object (or a list of
//! them, e.g. `tag_id` against `tags`), and all parameters must match.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::api::{Endpoint, NetboxApi, Operation, Query};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Filter { endpoint: Endpoint, query: Query },
    Create { endpoint: Endpoint, payload: Value },
    Update { endpoint: Endpoint, id: u64, changes: Value },
    Delete { endpoint: Endpoint, id: u64 },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::Filter { .. })
    }
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Endpoint, Vec<Value>>,
    calls: Vec<Call>,
    last_id: u64,
    reject: Option<(u16, String)>,
}

#[derive(Default)]
pub struct MemoryNetbox {
    inner: Mutex<Inner>,
}

impl MemoryNetbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object; it must carry an `id`.
    pub fn insert(&self, endpoint: Endpoint, object: Value) {
        let mut inner = self.inner.lock().unwrap();
        let id = object["id"].as_u64().expect("seeded objects need an id");
        inner.last_id = inner.last_id.max(id);
        inner.objects.entry(endpoint).or_default().push(object);
    }

    /// Make the next create, update or delete fail with this status.
    pub fn reject_next(&self, status: u16, message: &str) {
        self.inner.lock().unwrap().reject = Some((status, message.to_string()));
    }

    pub fn objects(&self, endpoint: Endpoint) -> Vec<Value> {
        let inner = self.inner.lock().unwrap();
        inner.objects.get(&endpoint).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Number of create, update and delete calls so far.
    pub fn mutations(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }
}

impl Inner {
    fn check_rejection(&mut self, operation: Operation, endpoint: Endpoint) -> Result<()> {
        match self.reject.take() {
            Some((status, message)) => Err(Error::RemoteApi {
                operation,
                endpoint: endpoint.to_string(),
                status,
                message,
            }),
            None => Ok(()),
        }
    }

    fn position(&self, endpoint: Endpoint, id: u64) -> Option<usize> {
        self.objects
            .get(&endpoint)?
            .iter()
            .position(|o| o["id"].as_u64() == Some(id))
    }
}

fn not_found(operation: Operation, endpoint: Endpoint) -> Error {
    Error::RemoteApi {
        operation,
        endpoint: endpoint.to_string(),
        status: 404,
        message: "Not found.".to_string(),
    }
}

fn scalar_matches(value: &Value, wanted: &str) -> bool {
    match value {
        Value::String(s) => s == wanted,
        Value::Number(n) => n.to_string() == wanted,
        Value::Bool(b) => b.to_string() == wanted,
        _ => false,
    }
}

fn id_matches(value: &Value, wanted: &str) -> bool {
    match value {
        Value::Object(o) => o.get("id").is_some_and(|id| scalar_matches(id, wanted)),
        other => scalar_matches(other, wanted),
    }
}

fn field_matches(object: &Value, key: &str, wanted: &str) -> bool {
    if let Some(value) = object.get(key) {
        return scalar_matches(value, wanted);
    }
    let Some(field) = key.strip_suffix("_id") else {
        return false;
    };
    for name in [field.to_string(), format!("{}s", field)] {
        match object.get(&name) {
            Some(Value::Array(items)) => return items.iter().any(|i| id_matches(i, wanted)),
            Some(value) => return id_matches(value, wanted),
            None => {}
        }
    }
    false
}

#[async_trait]
impl NetboxApi for MemoryNetbox {
    async fn filter(&self, endpoint: Endpoint, query: &Query) -> Result<Vec<Value>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Filter {
            endpoint,
            query: query.clone(),
        });
        Ok(inner
            .objects
            .get(&endpoint)
            .map(|objects| {
                objects
                    .iter()
                    .filter(|o| query.pairs().iter().all(|(k, v)| field_matches(o, k, v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, endpoint: Endpoint, payload: &Map<String, Value>) -> Result<Value> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Create {
            endpoint,
            payload: Value::Object(payload.clone()),
        });
        inner.check_rejection(Operation::Create, endpoint)?;
        inner.last_id += 1;
        let mut object = payload.clone();
        object.insert("id".to_string(), Value::from(inner.last_id));
        let object = Value::Object(object);
        inner.objects.entry(endpoint).or_default().push(object.clone());
        Ok(object)
    }

    async fn update(
        &self,
        endpoint: Endpoint,
        id: u64,
        changes: &Map<String, Value>,
    ) -> Result<Value> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Update {
            endpoint,
            id,
            changes: Value::Object(changes.clone()),
        });
        inner.check_rejection(Operation::Update, endpoint)?;
        let index = inner
            .position(endpoint, id)
            .ok_or_else(|| not_found(Operation::Update, endpoint))?;
        let objects = inner.objects.entry(endpoint).or_default();
        json_patch::merge(&mut objects[index], &Value::Object(changes.clone()));
        Ok(objects[index].clone())
    }

    async fn delete(&self, endpoint: Endpoint, id: u64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Delete { endpoint, id });
        inner.check_rejection(Operation::Delete, endpoint)?;
        let index = inner
            .position(endpoint, id)
            .ok_or_else(|| not_found(Operation::Delete, endpoint))?;
        inner.objects.entry(endpoint).or_default().remove(index);
        Ok(())
    }
}
