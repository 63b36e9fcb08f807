//! Module arguments.
//!
//! Every module accepts the same connection options plus its own `data`
//! section; [`ModuleArgs`] embeds [`ConnectionConfig`] and is generic over
//! the resource-specific data.

use std::path::PathBuf;

use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

/// Options shared by all modules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of NetBox; falls back to `NETBOX_API`.
    #[serde(default)]
    pub netbox_url: Option<String>,
    /// API token; falls back to `NETBOX_TOKEN`.
    #[serde(default)]
    pub netbox_token: Option<String>,
    #[serde(default)]
    pub cert: Option<CertConfig>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub validate_certs: Option<bool>,
}

/// A client certificate: one PEM file holding certificate and key, or a
/// `[certificate, key]` pair of files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CertConfig {
    Pem(PathBuf),
    Pair(PathBuf, PathBuf),
}

/// Connection options after defaults and environment fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub url: Url,
    pub token: String,
    pub cert: Option<CertConfig>,
    pub validate_certs: bool,
}

impl ConnectionConfig {
    pub fn resolve(self) -> Result<Connection> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_with(self, env: impl Fn(&str) -> Option<String>) -> Result<Connection> {
        let url = self
            .netbox_url
            .or_else(|| env("NETBOX_API"))
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::validation("netbox_url is required (or set NETBOX_API)"))?;
        let token = self
            .netbox_token
            .or_else(|| env("NETBOX_TOKEN"))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::validation("netbox_token is required (or set NETBOX_TOKEN)"))?;

        // Url::join replaces the last path segment unless the base ends in '/'
        let url = if url.ends_with('/') {
            url
        } else {
            format!("{}/", url)
        };
        let url = Url::parse(&url)
            .map_err(|e| Error::validation(format!("invalid netbox_url {:?}: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "netbox_url must use http or https, got {}",
                url.scheme()
            )));
        }

        Ok(Connection {
            url,
            token,
            cert: self.cert,
            validate_certs: self.validate_certs.unwrap_or(true),
        })
    }
}

/// Everything a module invocation receives.
#[derive(Debug, Deserialize)]
pub struct ModuleArgs<D> {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub state: State,
    pub data: D,
    #[serde(default)]
    pub query_params: Option<Vec<String>>,
    #[serde(default, alias = "_ansible_check_mode")]
    pub check_mode: bool,
}

/// Accept booleans also in their common string spellings.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Str(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Str(s)) => match s.to_ascii_lowercase().as_str() {
            "yes" | "true" | "on" | "1" => Ok(Some(true)),
            "no" | "false" | "off" | "0" => Ok(Some(false)),
            _ => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {:?}",
                s
            ))),
        },
    }
}
