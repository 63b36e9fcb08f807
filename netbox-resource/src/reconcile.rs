//! One reconciliation pass: validate, resolve, look up, then create, update,
//! delete or leave alone.
//!
//! All validation and every lookup happens before the single mutating call,
//! so a failure never leaves a half-applied change behind.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::api::{object_id, NetboxApi};
use crate::config::State;
use crate::diff::{self, Diff};
use crate::error::{Error, Result};
use crate::lookup;
use crate::reference::Resolver;
use crate::resource::ResourceType;
use crate::slug;

/// Outcome of a successful pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleResult {
    /// [`ResourceType::NAME`]; the key `object` is reported under.
    pub resource: &'static str,
    pub changed: bool,
    /// The object as it is (or, in check mode, would be) afterwards.
    pub object: Option<Value>,
    pub msg: String,
    pub diff: Option<Diff>,
}

impl Serialize for ModuleResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("changed", &self.changed)?;
        map.serialize_entry(self.resource, &self.object)?;
        map.serialize_entry("msg", &self.msg)?;
        if let Some(diff) = &self.diff {
            map.serialize_entry("diff", diff)?;
        }
        map.end()
    }
}

pub struct Reconciler<'a, A: ?Sized> {
    api: &'a A,
    check_mode: bool,
}

impl<'a, A: NetboxApi + ?Sized> Reconciler<'a, A> {
    /// In check mode every branch still computes its outcome, but no create,
    /// update or delete request is sent.
    pub fn new(api: &'a A, check_mode: bool) -> Self {
        Reconciler { api, check_mode }
    }

    #[instrument(skip_all, fields(resource = R::NAME, state = ?state, check_mode = self.check_mode))]
    pub async fn reconcile<R: ResourceType>(
        &self,
        state: State,
        data: &R::Data,
        query_params: Option<&[String]>,
    ) -> Result<ModuleResult> {
        R::validate(data)?;
        let mut desired = desired_state(data)?;
        if let Some(max_len) = R::slug_max_len() {
            let slug = slug::normalize(
                desired.get("name").and_then(Value::as_str),
                desired.get("slug").and_then(Value::as_str),
                max_len,
            )?;
            desired.insert("slug".to_string(), Value::String(slug));
        }
        // An empty override means "use the defaults"
        let query_params = query_params.filter(|p| !p.is_empty());
        if let Some(params) = query_params {
            lookup::validate_query_params(R::NAME, &desired, params)?;
        }
        let label = label::<R>(&desired, query_params);

        Resolver::new(self.api)
            .resolve_all(R::references(), &mut desired)
            .await?;

        let fields: Vec<&str> = match query_params {
            Some(params) => params.iter().map(String::as_str).collect(),
            None => R::query_params().to_vec(),
        };
        let query = lookup::build_query(R::NAME, &fields, R::references(), &desired)?;
        let found = lookup::find(self.api, R::NAME, R::endpoint(), &query).await?;

        match state {
            State::Present => self.ensure_present::<R>(desired, found, label).await,
            State::Absent => self.ensure_absent::<R>(found, label).await,
        }
    }

    async fn ensure_present<R: ResourceType>(
        &self,
        desired: Map<String, Value>,
        found: Option<Value>,
        label: String,
    ) -> Result<ModuleResult> {
        let endpoint = R::endpoint();
        let Some(remote) = found else {
            let object = if self.check_mode {
                Value::Object(desired)
            } else {
                let created = self.api.create(endpoint, &desired).await?;
                info!(resource = R::NAME, %label, "created");
                created
            };
            return Ok(ModuleResult {
                resource: R::NAME,
                changed: true,
                object: Some(object),
                msg: format!("{} {} created", R::NAME, label),
                diff: Some(Diff::created()),
            });
        };

        let changes = diff::changeset(&desired, &remote);
        if changes.is_empty() {
            return Ok(ModuleResult {
                resource: R::NAME,
                changed: false,
                object: Some(remote),
                msg: format!("{} {} already exists", R::NAME, label),
                diff: None,
            });
        }

        let id = object_id(endpoint, &remote)?;
        let report = Diff::updated(&remote, &changes);
        let object = if self.check_mode {
            let mut preview = remote;
            json_patch::merge(&mut preview, &Value::Object(changes));
            preview
        } else {
            let updated = self.api.update(endpoint, id, &changes).await?;
            info!(resource = R::NAME, %label, id, fields = ?changes.keys().collect::<Vec<_>>(), "updated");
            updated
        };
        Ok(ModuleResult {
            resource: R::NAME,
            changed: true,
            object: Some(object),
            msg: format!("{} {} updated", R::NAME, label),
            diff: Some(report),
        })
    }

    async fn ensure_absent<R: ResourceType>(
        &self,
        found: Option<Value>,
        label: String,
    ) -> Result<ModuleResult> {
        let Some(remote) = found else {
            return Ok(ModuleResult {
                resource: R::NAME,
                changed: false,
                object: None,
                msg: format!("{} {} already absent", R::NAME, label),
                diff: None,
            });
        };

        let endpoint = R::endpoint();
        let id = object_id(endpoint, &remote)?;
        if !self.check_mode {
            self.api.delete(endpoint, id).await?;
            info!(resource = R::NAME, %label, id, "deleted");
        }
        Ok(ModuleResult {
            resource: R::NAME,
            changed: true,
            object: None,
            msg: format!("{} {} deleted", R::NAME, label),
            diff: Some(Diff::deleted()),
        })
    }
}

/// The desired attributes as a JSON object, without `null` fields.
pub fn desired_state<D: serde::Serialize>(data: &D) -> Result<Map<String, Value>> {
    match serde_json::to_value(data) {
        Ok(Value::Object(fields)) => Ok(fields.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        Ok(other) => Err(Error::validation(format!(
            "data must be a mapping, got {}",
            other
        ))),
        Err(e) => Err(Error::validation(format!("invalid data: {}", e))),
    }
}

/// How the object is named in messages: its name, or else the first
/// identifying value the user gave.
fn label<R: ResourceType>(desired: &Map<String, Value>, query_params: Option<&[String]>) -> String {
    let fields = query_params
        .map(|p| p.iter().map(String::as_str).collect::<Vec<_>>())
        .unwrap_or_else(|| R::query_params().to_vec());
    std::iter::once("name")
        .chain(fields)
        .find_map(|f| desired.get(f))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}
