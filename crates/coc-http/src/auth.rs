//! Developer-portal login and API key selection.
//!
//! The provider only accepts a key from the addresses listed on it, so a usable
//! bearer token is found by matching the caller's egress address against the
//! ranges of every key on the account.

use std::sync::Arc;

use coc_core::{
    domain::{self, ApiKey, EgressAddress, Session},
    errors::Error,
    logging::fingerprint,
    ports::EgressLookup,
    protocol::classify_portal_response,
    route::RouteTemplate,
    Result,
};
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::{json, Value};
use tokio::sync::{OnceCell, RwLock};

use crate::transport_error;

pub const LOGIN: RouteTemplate = RouteTemplate::post("/api/login");
pub const LIST_KEYS: RouteTemplate = RouteTemplate::post("/api/apikey/list");

pub struct SessionAuthenticator {
    http: reqwest::Client,
    developer_base_url: String,
    egress: Arc<dyn EgressLookup>,
    egress_cache: OnceCell<EgressAddress>,
    keys: RwLock<Vec<ApiKey>>,
}

impl SessionAuthenticator {
    pub fn new(
        http: reqwest::Client,
        developer_base_url: impl Into<String>,
        egress: Arc<dyn EgressLookup>,
    ) -> Self {
        Self {
            http,
            developer_base_url: developer_base_url.into(),
            egress,
            egress_cache: OnceCell::new(),
            keys: RwLock::new(Vec::new()),
        }
    }

    /// Post credentials to the portal and capture the session cookie.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}{}", self.developer_base_url, LOGIN.pattern);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport_error)?;

        let cookie = session_cookie(resp.headers());
        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::auth(format!("login response is not valid JSON: {e}"), None))?;

        if let Err(e) = classify_portal_response(&body) {
            let payload = e.payload().cloned().unwrap_or(body);
            return Err(Error::auth("login rejected by the developer portal", Some(payload)));
        }

        let temporary_token = body
            .get("temporaryAPIToken")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::auth("login response has no temporaryAPIToken", Some(body.clone()))
            })?
            .to_string();
        let swagger_url = body
            .get("swaggerUrl")
            .and_then(Value::as_str)
            .map(str::to_string);
        let cookie = cookie.ok_or_else(|| {
            Error::auth("login response did not set a session cookie", Some(body.clone()))
        })?;

        tracing::info!(email, "developer portal login succeeded");
        Ok(Session::new(cookie, temporary_token, swagger_url))
    }

    /// List every key on the account and replace the known key set.
    pub async fn fetch_keys(&self, session: &Session) -> Result<Vec<ApiKey>> {
        let url = format!("{}{}", self.developer_base_url, LIST_KEYS.pattern);
        let resp = self
            .http
            .post(&url)
            .header(COOKIE, format!("session={}", session.cookie))
            .json(&json!({}))
            .send()
            .await
            .map_err(transport_error)?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| Error::protocol(format!("key listing is not valid JSON: {e}"), None))?;
        classify_portal_response(&body)?;

        let keys = domain::parse_key_list(&body)?;
        tracing::info!(count = keys.len(), "fetched API keys");
        *self.keys.write().await = keys.clone();
        Ok(keys)
    }

    /// Keys from the most recent [`SessionAuthenticator::fetch_keys`].
    pub async fn known_keys(&self) -> Vec<ApiKey> {
        self.keys.read().await.clone()
    }

    /// Caller's public address, looked up once and cached for the lifetime of
    /// the authenticator. Failed lookups are not cached.
    pub async fn detect_egress_address(&self) -> Result<EgressAddress> {
        let addr = self
            .egress_cache
            .get_or_try_init(|| self.egress.lookup())
            .await?;
        Ok(*addr)
    }

    /// Pick the key usable from `egress` and mark `session` ready with it.
    ///
    /// An unmatched address fails; a key for it has to be created on the
    /// developer portal before logging in again.
    pub fn resolve_token(
        &self,
        session: &mut Session,
        keys: &[ApiKey],
        egress: EgressAddress,
    ) -> Result<String> {
        let key = domain::resolve_token(keys, egress)?.clone();
        let token = key.key_value.clone();
        tracing::info!(
            %egress,
            key = key.name.as_deref().unwrap_or("<unnamed>"),
            token = %fingerprint(&token),
            "resolved API key for egress address"
        );
        session.activate(key);
        Ok(token)
    }

    /// `login` → `fetch_keys` → `detect_egress_address` → `resolve_token`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session> {
        let mut session = self.login(email, password).await?;
        let keys = self.fetch_keys(&session).await?;
        let egress = self.detect_egress_address().await?;
        self.resolve_token(&mut session, &keys, egress)?;
        Ok(session)
    }
}

fn session_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "session")
        .map(|(_, value)| value.to_string())
}
