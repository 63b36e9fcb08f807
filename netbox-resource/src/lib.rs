//! Idempotent reconciliation of NetBox objects.
//!
//! Given the desired state of one object, [`reconcile::Reconciler`] looks the
//! object up through the REST API and creates, partially updates or deletes
//! it so that NetBox matches, issuing at most one mutating request. Each
//! managed object kind is described by a [`resource::ResourceType`]; module
//! executables hand one to [`framework::run_main`].

pub mod api;
pub mod client;
pub mod config;
pub mod diff;
pub mod error;
pub mod framework;
pub mod logging;
pub mod lookup;
pub mod reconcile;
pub mod reference;
pub mod resource;
pub mod slug;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
