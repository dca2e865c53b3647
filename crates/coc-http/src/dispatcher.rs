use std::{backtrace::Backtrace, time::Duration};

use coc_core::{
    errors::Error,
    logging::fingerprint,
    protocol::classify_api_response,
    record::{materialize_record, GenericRecord},
    route::{Method, RouteTemplate},
    throttle::Throttler,
    Result,
};
use serde_json::Value;

use crate::transport_error;

/// One provider endpoint: a route plus the transform that types its result.
pub struct Endpoint<T> {
    pub name: &'static str,
    pub route: RouteTemplate,
    pub transform: fn(GenericRecord) -> T,
}

impl<T> Endpoint<T> {
    pub const fn new(
        name: &'static str,
        route: RouteTemplate,
        transform: fn(GenericRecord) -> T,
    ) -> Self {
        Self {
            name,
            route,
            transform,
        }
    }
}

/// Per-call inputs besides the endpoint itself.
#[derive(Clone, Debug, Default)]
pub struct Call<'a> {
    pub path_args: &'a [(&'a str, &'a str)],
    pub query: Vec<(&'static str, String)>,
    pub body: Option<&'a Value>,
}

/// Executes endpoint calls against the game API under the shared throttle.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    http: reqwest::Client,
    base_url: String,
    throttler: Throttler,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        throttler: Throttler,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            throttler,
            timeout,
        }
    }

    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }

    /// Run `endpoint` with `token` as bearer credential.
    ///
    /// Every failure is logged here with the call's arguments and URL, then
    /// returned to the caller.
    pub async fn dispatch<T>(&self, endpoint: &Endpoint<T>, token: &str, call: Call<'_>) -> Result<T> {
        let (url, result) = match endpoint.route.resolve(call.path_args) {
            Ok(path) => {
                let url = format!("{}{}", self.base_url, path);
                let result = self.bounded(endpoint, token, &url, &call).await;
                (url, result)
            }
            Err(e) => (endpoint.route.pattern.to_string(), Err(e)),
        };

        match &result {
            Ok(_) => tracing::debug!(endpoint = endpoint.name, %url, "request succeeded"),
            Err(e) => tracing::error!(
                endpoint = endpoint.name,
                route = %endpoint.route,
                args = ?call.path_args,
                query = ?call.query,
                %url,
                kind = %e.kind(),
                token = %fingerprint(token),
                payload = ?e.payload(),
                error = %e,
                backtrace = %Backtrace::capture(),
                "request failed"
            ),
        }
        result
    }

    async fn bounded<T>(
        &self,
        endpoint: &Endpoint<T>,
        token: &str,
        url: &str,
        call: &Call<'_>,
    ) -> Result<T> {
        let fut = self.execute(endpoint, token, url, call);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or(Err(Error::Timeout(limit))),
            None => fut.await,
        }
    }

    async fn execute<T>(
        &self,
        endpoint: &Endpoint<T>,
        token: &str,
        url: &str,
        call: &Call<'_>,
    ) -> Result<T> {
        let (status, bytes) = {
            // Held for the network exchange only, not for parsing.
            let _permit = self.throttler.acquire().await;

            let mut req = self
                .http
                .request(reqwest_method(endpoint.route.method), url)
                .bearer_auth(token);
            if !call.query.is_empty() {
                req = req.query(&call.query);
            }
            if let Some(body) = call.body {
                req = req.json(body);
            }

            let resp = req.send().await.map_err(transport_error)?;
            let status = resp.status();
            let bytes = resp.bytes().await.map_err(transport_error)?;
            (status, bytes)
        };

        let json: Value = serde_json::from_slice(&bytes).map_err(|e| {
            Error::protocol(
                format!("{} returned a non-JSON body ({status}): {e}", endpoint.name),
                None,
            )
        })?;
        classify_api_response(status.as_u16(), &json)?;

        let record = materialize_record(json)?;
        Ok((endpoint.transform)(record))
    }
}

fn reqwest_method(m: Method) -> reqwest::Method {
    match m {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_capture::LogBuffer;
    use coc_core::{
        models::{Player, Resource},
        throttle::{AdmissionPolicy, ThrottleConfig},
        ErrorKind,
    };
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAYER: Endpoint<Player> =
        Endpoint::new("get_player", RouteTemplate::get("/players/{tag}"), Player::from_record);

    fn dispatcher(base: &str, limit: usize, timeout: Option<Duration>) -> Dispatcher {
        let throttler = Throttler::new(ThrottleConfig {
            limit,
            policy: AdmissionPolicy::WakeOnRelease,
        })
        .unwrap();
        Dispatcher::new(reqwest::Client::new(), base, throttler, timeout)
    }

    fn tag_args(tag: &str) -> [(&str, &str); 1] {
        [("tag", tag)]
    }

    #[tokio::test]
    async fn sends_bearer_and_encoded_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/players/%23ABC123"))
            .and(header("authorization", "Bearer K1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag": "#ABC123", "name": "Foo", "townHallLevel": 10
            })))
            .expect(1)
            .mount(&server)
            .await;

        let d = dispatcher(&server.uri(), 2, None);
        let args = tag_args("#ABC123");
        let call = Call {
            path_args: &args,
            ..Default::default()
        };
        let player = d.dispatch(&PLAYER, "K1", call).await.unwrap();
        assert_eq!(player.name(), Some("Foo"));
        assert_eq!(d.throttler().in_flight(), 0);
    }

    #[tokio::test]
    async fn provider_error_surfaces_with_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"reason": "notFound", "message": "Not found"})),
            )
            .mount(&server)
            .await;

        let d = dispatcher(&server.uri(), 1, None);
        let args = tag_args("#2PP");
        let err = d
            .dispatch(&PLAYER, "K1", Call { path_args: &args, ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiProtocol);
        assert_eq!(err.payload().unwrap()["reason"], "notFound");
        assert_eq!(d.throttler().in_flight(), 0);
    }

    #[tokio::test]
    async fn failures_are_logged_without_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"reason": "notFound"})))
            .mount(&server)
            .await;

        let logs = LogBuffer::default();
        let _guard = logs.install();

        let d = dispatcher(&server.uri(), 1, None);
        let args = tag_args("#2PP");
        d.dispatch(&PLAYER, "K1", Call { path_args: &args, ..Default::default() })
            .await
            .unwrap_err();

        let out = logs.contents();
        assert!(out.contains("request failed"), "{out}");
        assert!(out.contains("get_player"), "{out}");
        assert!(out.contains("/players/%232PP"), "{out}");
        assert!(out.contains("#2PP"), "{out}");
        assert!(out.contains("api_protocol"), "{out}");
        assert!(out.contains("notFound"), "{out}");
        assert!(out.contains(&fingerprint("K1")), "{out}");
        assert!(!out.contains("Bearer K1"), "{out}");
        assert!(!out.contains("\"K1\""), "{out}");
    }

    #[tokio::test]
    async fn non_json_body_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let d = dispatcher(&server.uri(), 1, None);
        let args = tag_args("#2PP");
        let err = d
            .dispatch(&PLAYER, "K1", Call { path_args: &args, ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiProtocol);
        assert_eq!(d.throttler().in_flight(), 0);
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let d = dispatcher("http://127.0.0.1:1", 1, None);
        let args = tag_args("#2PP");
        let err = d
            .dispatch(&PLAYER, "K1", Call { path_args: &args, ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(d.throttler().in_flight(), 0);
    }

    #[tokio::test]
    async fn deadline_bounds_slow_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"tag": "#2PP"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let d = dispatcher(&server.uri(), 1, Some(Duration::from_millis(50)));
        let args = tag_args("#2PP");
        let err = d
            .dispatch(&PLAYER, "K1", Call { path_args: &args, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(d.throttler().in_flight(), 0);
    }

    #[tokio::test]
    async fn missing_path_argument_never_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let d = dispatcher(&server.uri(), 1, None);
        let err = d
            .dispatch(&PLAYER, "K1", Call::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[tokio::test]
    async fn forwards_query_and_body() {
        const VERIFY: Endpoint<GenericRecord> = Endpoint::new(
            "verify",
            RouteTemplate::post("/players/{tag}/verifytoken"),
            std::convert::identity,
        );

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/players/%232PP/verifytoken"))
            .and(query_param("limit", "5"))
            .and(body_json(json!({"token": "abc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let d = dispatcher(&server.uri(), 1, None);
        let args = tag_args("#2PP");
        let body = json!({"token": "abc"});
        let rec = d
            .dispatch(
                &VERIFY,
                "K1",
                Call {
                    path_args: &args,
                    query: vec![("limit", "5".to_string())],
                    body: Some(&body),
                },
            )
            .await
            .unwrap();
        assert_eq!(rec.get_str("status"), Some("ok"));
    }

    #[tokio::test]
    async fn concurrent_calls_share_the_throttle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"tag": "#2PP"}))
                    .set_delay(Duration::from_millis(30)),
            )
            .mount(&server)
            .await;

        let d = dispatcher(&server.uri(), 2, None);
        let mut tasks = Vec::new();
        for _ in 0..6 {
            let d = d.clone();
            tasks.push(tokio::spawn(async move {
                let args = [("tag", "#2PP")];
                d.dispatch(&PLAYER, "K1", Call { path_args: &args, ..Default::default() })
                    .await
            }));
        }

        let watcher = {
            let t = d.throttler().clone();
            tokio::spawn(async move {
                let mut peak = 0;
                for _ in 0..50 {
                    peak = peak.max(t.in_flight());
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                peak
            })
        };

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(watcher.await.unwrap() <= 2);
        assert_eq!(d.throttler().in_flight(), 0);
    }
}
