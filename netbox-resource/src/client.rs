//! [`NetboxApi`] over the NetBox REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Identity, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::api::{Endpoint, NetboxApi, Operation, Query};
use crate::config::{CertConfig, Connection};
use crate::error::{Error, Result};

pub struct NetboxClient {
    http: Client,
    base: Url,
}

impl std::fmt::Debug for NetboxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetboxClient")
            .field("base", &self.base.as_str())
            .finish()
    }
}

/// One page of a NetBox list response.
#[derive(Debug, Deserialize)]
struct Page {
    results: Vec<Value>,
    next: Option<String>,
}

impl NetboxClient {
    pub fn new(connection: &Connection) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Token {}", connection.token))
            .map_err(|_| Error::validation("netbox_token contains invalid characters"))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("netbox-modules/", env!("CARGO_PKG_VERSION")));
        if !connection.validate_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(cert) = &connection.cert {
            builder = builder.identity(load_identity(cert)?);
        }

        Ok(NetboxClient {
            http: builder.build().map_err(Error::transport)?,
            base: connection.url.clone(),
        })
    }

    fn url(&self, endpoint: Endpoint, id: Option<u64>) -> Result<Url> {
        let path = match id {
            Some(id) => format!("{}{}/", endpoint.path(), id),
            None => endpoint.path(),
        };
        self.base
            .join(&path)
            .map_err(|e| Error::validation(format!("invalid URL for {}: {}", endpoint, e)))
    }

    async fn send(
        &self,
        operation: Operation,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> Result<Response> {
        let response = request.send().await.map_err(Error::transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::RemoteApi {
            operation,
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn json(&self, endpoint: Endpoint, response: Response) -> Result<Value> {
        response.json().await.map_err(|e| Error::UnexpectedResponse {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl NetboxApi for NetboxClient {
    #[instrument(skip_all, fields(%endpoint, %query))]
    async fn filter(&self, endpoint: Endpoint, query: &Query) -> Result<Vec<Value>> {
        let mut request = self
            .http
            .get(self.url(endpoint, None)?)
            .query(query.pairs());
        let mut objects = Vec::new();
        loop {
            let response = self.send(Operation::Read, endpoint, request).await?;
            let page: Page = serde_json::from_value(self.json(endpoint, response).await?)
                .map_err(|e| Error::UnexpectedResponse {
                    endpoint: endpoint.to_string(),
                    message: format!("not a list response: {}", e),
                })?;
            objects.extend(page.results);
            match page.next {
                Some(next) => {
                    debug!(%next, "following next page");
                    let next = Url::parse(&next).map_err(|e| Error::UnexpectedResponse {
                        endpoint: endpoint.to_string(),
                        message: format!("invalid next link: {}", e),
                    })?;
                    request = self.http.get(next);
                }
                None => break,
            }
        }
        debug!(count = objects.len(), "filter done");
        Ok(objects)
    }

    #[instrument(skip_all, fields(%endpoint))]
    async fn create(&self, endpoint: Endpoint, payload: &Map<String, Value>) -> Result<Value> {
        let request = self.http.post(self.url(endpoint, None)?).json(payload);
        let response = self.send(Operation::Create, endpoint, request).await?;
        self.json(endpoint, response).await
    }

    #[instrument(skip_all, fields(%endpoint, id = id))]
    async fn update(
        &self,
        endpoint: Endpoint,
        id: u64,
        changes: &Map<String, Value>,
    ) -> Result<Value> {
        let request = self.http.patch(self.url(endpoint, Some(id))?).json(changes);
        let response = self.send(Operation::Update, endpoint, request).await?;
        self.json(endpoint, response).await
    }

    #[instrument(skip_all, fields(%endpoint, id = id))]
    async fn delete(&self, endpoint: Endpoint, id: u64) -> Result<()> {
        let request = self.http.delete(self.url(endpoint, Some(id))?);
        self.send(Operation::Delete, endpoint, request).await?;
        Ok(())
    }
}

fn load_identity(cert: &CertConfig) -> Result<Identity> {
    let read = |path: &std::path::Path| {
        std::fs::read(path).map_err(|e| {
            Error::validation(format!("could not read cert {}: {}", path.display(), e))
        })
    };
    let pem = match cert {
        CertConfig::Pem(path) => read(path)?,
        CertConfig::Pair(cert, key) => {
            let mut pem = read(cert)?;
            pem.push(b'\n');
            pem.extend(read(key)?);
            pem
        }
    };
    Identity::from_pem(&pem).map_err(|e| Error::validation(format!("invalid cert: {}", e)))
}

/// The most useful part of a NetBox error body: `detail` when present,
/// otherwise field errors as `field: message`, otherwise the raw body.
fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    if let Some(detail) = json.get("detail").and_then(Value::as_str) {
        return detail.to_string();
    }
    match json {
        Value::Object(fields) => fields
            .iter()
            .map(|(field, errors)| {
                let errors = match errors {
                    Value::Array(list) => list
                        .iter()
                        .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                        .collect::<Vec<_>>()
                        .join(" "),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{}: {}", field, errors)
            })
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        Connection {
            url: Url::parse("http://netbox.local/prefix/").unwrap(),
            token: "t".to_string(),
            cert: None,
            validate_certs: true,
        }
    }

    #[test]
    fn urls() {
        let client = NetboxClient::new(&connection()).unwrap();
        let e = Endpoint::new("dcim", "virtual-chassis");
        assert_eq!(
            client.url(e, None).unwrap().as_str(),
            "http://netbox.local/prefix/api/dcim/virtual-chassis/"
        );
        assert_eq!(
            client.url(e, Some(4)).unwrap().as_str(),
            "http://netbox.local/prefix/api/dcim/virtual-chassis/4/"
        );
    }

    #[test]
    fn token_must_be_header_safe() {
        let mut c = connection();
        c.token = "bad\ntoken".to_string();
        assert!(NetboxClient::new(&c).is_err());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            error_message(r#"{"detail": "Invalid token"}"#),
            "Invalid token"
        );
        assert_eq!(
            error_message(r#"{"name": ["cluster group with this name already exists."]}"#),
            "name: cluster group with this name already exists."
        );
        assert_eq!(error_message("<html>502</html>\n"), "<html>502</html>");
    }

    #[test]
    fn missing_cert_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cert = CertConfig::Pem(dir.path().join("missing.pem"));
        let err = load_identity(&cert).unwrap_err();
        assert!(err.to_string().contains("missing.pem"), "{}", err);
    }
}
