use async_trait::async_trait;
use coc_core::{domain::EgressAddress, errors::Error, ports::EgressLookup, Result};

use crate::transport_error;

/// Asks an IP-echo service (`{"origin": "<ip>"}`) for the caller's public address.
#[derive(Clone, Debug)]
pub struct HttpEgressLookup {
    http: reqwest::Client,
    url: String,
}

impl HttpEgressLookup {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl EgressLookup for HttpEgressLookup {
    async fn lookup(&self) -> Result<EgressAddress> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(transport_error)?;

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::protocol(format!("egress lookup returned invalid JSON: {e}"), None))?;

        let origin = v.get("origin").and_then(|o| o.as_str()).ok_or_else(|| {
            Error::protocol("egress lookup response has no \"origin\"", Some(v.clone()))
        })?;

        EgressAddress::parse_origin(origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coc_core::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn reads_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ip"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"origin": "1.2.3.4"})))
            .mount(&server)
            .await;

        let lookup = HttpEgressLookup::new(reqwest::Client::new(), format!("{}/ip", server.uri()));
        assert_eq!(lookup.lookup().await.unwrap().to_string(), "1.2.3.4");
    }

    #[tokio::test]
    async fn missing_origin_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ip": "1.2.3.4"})))
            .mount(&server)
            .await;

        let lookup = HttpEgressLookup::new(reqwest::Client::new(), server.uri());
        let err = lookup.lookup().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiProtocol);
    }
}
