use std::{collections::BTreeSet, error::Error as StdError, fmt, str::FromStr, sync::Arc};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::api_errors::{Error, Result};

/// HTTP methods the executor is willing to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(Error::InvalidMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Flat, ordered key-value options sent as the query string.
/// Values go out verbatim, callers pre-encode them when needed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryOptions(Vec<(String, String)>);

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place so order is kept
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();

        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `key=value` pairs joined by `&`, no percent-encoding
    pub fn to_query_string(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Appends the options to `url`, leaving it untouched when there are none
    pub fn apply_to(&self, url: &str) -> String {
        if self.is_empty() {
            return url.to_string();
        }

        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", url, separator, self.to_query_string())
    }
}

impl<K: Into<String>, V: ToString> std::iter::FromIterator<(K, V)> for QueryOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = QueryOptions::new();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}

/// What came back from the server, before any interpretation
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// `Err` holds why the body could not be read after the status arrived
    pub body: std::result::Result<String, String>,
}

pub type TransportError = Box<dyn StdError + Send + Sync>;

/// Capability to put a single request on the wire.
/// An error means no response was received at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(
        &self,
        method: Method,
        url: &str,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// Entity that takes care on transport layer
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(
        &self,
        method: Method,
        url: &str,
    ) -> std::result::Result<RawResponse, TransportError> {
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let res = self.inner.request(method, url).send().await?;

        let status = res.status().as_u16();
        let headers = res
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = res.text().await.map_err(|e| e.to_string());

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Reasons a request did not succeed. Several can hold at once,
/// e.g. a 404 whose body is not JSON either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    MalformedBody,
    FailedRequest,
    UnexpectedStatus,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::MalformedBody => "malformed-body",
            ErrorKind::FailedRequest => "failed-request",
            ErrorKind::UnexpectedStatus => "unexpected-status",
        };
        write!(f, "{}", name)
    }
}

/// Normalized record of one request execution, successful or not
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    pub url: String,
    pub method: Method,
    pub options: QueryOptions,
    pub success: bool,
    /// Transport succeeded with 200 but the body was not JSON
    pub non_json_success: bool,
    /// Empty when the request succeeded
    pub errors: BTreeSet<ErrorKind>,
    pub raw_error: Option<String>,
    pub status: Option<u16>,
    pub raw_body: Option<String>,
    pub parsed_resp: Option<Value>,
}

impl RequestOutcome {
    fn transport_failure(
        method: Method,
        url: &str,
        options: QueryOptions,
        message: String,
    ) -> Self {
        let mut errors = BTreeSet::new();
        errors.insert(ErrorKind::FailedRequest);

        Self {
            url: url.to_string(),
            method,
            options,
            success: false,
            non_json_success: false,
            errors,
            raw_error: Some(message),
            status: None,
            raw_body: None,
            parsed_resp: None,
        }
    }

    /// Classifies a response that did arrive
    fn from_response(method: Method, url: &str, options: QueryOptions, res: RawResponse) -> Self {
        let mut errors = BTreeSet::new();
        let mut raw_error = None;

        let (raw_body, parsed_resp) = match res.body {
            Ok(body) => match serde_json::from_str::<Value>(&body) {
                Ok(value) => (Some(body), Some(value)),
                Err(e) => {
                    errors.insert(ErrorKind::MalformedBody);
                    raw_error = Some(e.to_string());
                    (Some(body), None)
                }
            },
            // The status is known, only the body is lost
            Err(read_error) => {
                errors.insert(ErrorKind::MalformedBody);
                raw_error = Some(read_error);
                (None, None)
            }
        };

        let ok_status = res.status == 200;
        if !ok_status {
            errors.insert(ErrorKind::UnexpectedStatus);
            // Api response contains useful information about the problem
            if let Some(body) = &raw_body {
                raw_error = Some(body.clone());
            }
        }

        Self {
            url: url.to_string(),
            method,
            options,
            success: errors.is_empty(),
            non_json_success: ok_status && parsed_resp.is_none(),
            errors,
            raw_error,
            status: Some(res.status),
            raw_body,
            parsed_resp,
        }
    }

    pub fn has_error(&self, kind: ErrorKind) -> bool {
        self.errors.contains(&kind)
    }

    /// Parsed body; `Null` only for outcomes that never had one
    pub fn into_parsed(self) -> Value {
        self.parsed_resp.unwrap_or(Value::Null)
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kinds = self
            .errors
            .iter()
            .map(|kind| kind.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        write!(f, "{} {} failed ({})", self.method, self.url, kinds)?;
        if let Some(status) = self.status {
            write!(f, " with status {}", status)?;
        }
        if let Some(raw_error) = &self.raw_error {
            write!(f, ": {}", raw_error)?;
        }
        Ok(())
    }
}

/// Issues requests through a `Transport` and normalizes what comes back
#[derive(Clone)]
pub struct Requester {
    transport: Arc<dyn Transport>,
}

impl Requester {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Performs exactly one request. `method` is checked before anything
    /// touches the network. A success is an outcome with a parsed body,
    /// every other completion comes back as `Error::Request`.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        options: &QueryOptions,
    ) -> Result<RequestOutcome> {
        let method: Method = method.parse()?;
        let endpoint = options.apply_to(url);

        debug!("{} {}", method, endpoint);

        let outcome = match self.transport.perform(method, &endpoint).await {
            Ok(res) => RequestOutcome::from_response(method, &endpoint, options.clone(), res),
            Err(e) => {
                RequestOutcome::transport_failure(method, &endpoint, options.clone(), e.to_string())
            }
        };

        if outcome.success {
            Ok(outcome)
        } else {
            if outcome.has_error(ErrorKind::MalformedBody) {
                warn!("Response body of {} is unreadable or not JSON", endpoint);
            }
            debug!("{}", outcome);
            Err(Error::Request(Box::new(outcome)))
        }
    }

    pub async fn get(&self, url: &str, options: &QueryOptions) -> Result<RequestOutcome> {
        self.request(Method::Get.as_str(), url, options).await
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::mock::MockTransport;
    use super::*;

    fn requester(transport: &Arc<MockTransport>) -> Requester {
        Requester::new(transport.clone())
    }

    #[test]
    fn method_parses_only_known_names() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!(matches!(
            "PATCH".parse::<Method>(),
            Err(Error::InvalidMethod(name)) if name == "PATCH"
        ));
        assert!("get".parse::<Method>().is_err());
    }

    #[test]
    fn query_string_keeps_insertion_order_without_encoding() {
        let options = QueryOptions::new().with("a", 1).with("b", 2);
        assert_eq!(options.apply_to("https://x"), "https://x?a=1&b=2");

        let raw = QueryOptions::new().with("q", "a b&c");
        assert_eq!(raw.to_query_string(), "q=a b&c");

        assert_eq!(QueryOptions::new().apply_to("https://x"), "https://x");
        assert_eq!(
            options.apply_to("https://x?page=1"),
            "https://x?page=1&a=1&b=2"
        );
    }

    #[test]
    fn insert_replaces_existing_key_in_place() {
        let mut options: QueryOptions = vec![("sort", "pushed"), ("type", "owner")]
            .into_iter()
            .collect();
        options.insert("sort", "updated");

        assert_eq!(options.get("sort"), Some("updated"));
        assert_eq!(options.to_query_string(), "sort=updated&type=owner");
    }

    #[tokio::test]
    async fn invalid_method_never_reaches_transport() {
        let transport = Arc::new(MockTransport::new());

        let res = requester(&transport)
            .request("PATCH", "https://x", &QueryOptions::new())
            .await;

        assert!(matches!(res, Err(Error::InvalidMethod(_))));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn success_carries_parsed_body() {
        let transport = Arc::new(MockTransport::new());
        transport.shall_return_json("https://x?a=1&b=2", &json!({"ok": true}));

        let options = QueryOptions::new().with("a", 1).with("b", 2);
        let outcome = requester(&transport)
            .request("GET", "https://x", &options)
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(!outcome.non_json_success);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.url, "https://x?a=1&b=2");
        assert_eq!(outcome.options, options);
        assert_eq!(outcome.parsed_resp, Some(json!({"ok": true})));
        assert_eq!(
            transport.calls(),
            vec![(Method::Get, "https://x?a=1&b=2".to_string())]
        );
    }

    #[tokio::test]
    async fn ok_status_with_non_json_body_is_malformed() {
        let transport = Arc::new(MockTransport::new());
        transport.shall_return("https://x", 200, "not json");

        let res = requester(&transport)
            .get("https://x", &QueryOptions::new())
            .await;

        match res {
            Err(Error::Request(outcome)) => {
                assert!(!outcome.success);
                assert!(outcome.non_json_success);
                assert_eq!(
                    outcome.errors.iter().copied().collect::<Vec<_>>(),
                    vec![ErrorKind::MalformedBody]
                );
                assert_eq!(outcome.raw_body.as_deref(), Some("not json"));
                assert!(outcome.parsed_resp.is_none());
            }
            other => panic!("Expected Request error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn not_found_keeps_parsed_body_for_diagnostics() {
        let transport = Arc::new(MockTransport::new());
        transport.shall_return("https://x", 404, r#"{"message":"Not Found"}"#);

        let res = requester(&transport)
            .get("https://x", &QueryOptions::new())
            .await;

        match res {
            Err(Error::Request(outcome)) => {
                assert!(!outcome.success);
                assert!(!outcome.non_json_success);
                assert!(outcome.has_error(ErrorKind::UnexpectedStatus));
                assert!(!outcome.has_error(ErrorKind::MalformedBody));
                assert_eq!(outcome.status, Some(404));
                assert_eq!(outcome.parsed_resp, Some(json!({"message": "Not Found"})));
                assert_eq!(
                    outcome.raw_error.as_deref(),
                    Some(r#"{"message":"Not Found"}"#)
                );
            }
            other => panic!("Expected Request error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn bad_status_and_bad_body_combine() {
        let transport = Arc::new(MockTransport::new());
        transport.shall_return("https://x", 502, "<html>Bad Gateway</html>");

        let err = requester(&transport)
            .get("https://x", &QueryOptions::new())
            .await
            .unwrap_err();
        let outcome = err.outcome().unwrap();

        assert!(outcome.has_error(ErrorKind::UnexpectedStatus));
        assert!(outcome.has_error(ErrorKind::MalformedBody));
        assert!(!outcome.non_json_success);
        assert_eq!(
            err.to_string(),
            "GET https://x failed (malformed-body, unexpected-status) with status 502: <html>Bad Gateway</html>"
        );
    }

    #[tokio::test]
    async fn unreadable_body_keeps_status() {
        let transport = Arc::new(MockTransport::new());
        transport.shall_cut_body("https://x", 200, "connection reset while reading body");

        let err = requester(&transport)
            .get("https://x", &QueryOptions::new())
            .await
            .unwrap_err();
        let outcome = err.outcome().unwrap();

        assert_eq!(outcome.status, Some(200));
        assert_eq!(
            outcome.errors.iter().copied().collect::<Vec<_>>(),
            vec![ErrorKind::MalformedBody]
        );
        assert!(!outcome.has_error(ErrorKind::FailedRequest));
        assert!(outcome.raw_body.is_none());
        assert_eq!(
            outcome.raw_error.as_deref(),
            Some("connection reset while reading body")
        );
    }

    #[tokio::test]
    async fn unreadable_body_with_bad_status_reports_both() {
        let transport = Arc::new(MockTransport::new());
        transport.shall_cut_body("https://x", 503, "body timed out");

        let err = requester(&transport)
            .get("https://x", &QueryOptions::new())
            .await
            .unwrap_err();
        let outcome = err.outcome().unwrap();

        assert_eq!(outcome.status, Some(503));
        assert!(outcome.has_error(ErrorKind::MalformedBody));
        assert!(outcome.has_error(ErrorKind::UnexpectedStatus));
        assert_eq!(outcome.raw_error.as_deref(), Some("body timed out"));
    }

    #[tokio::test]
    async fn missing_response_is_failed_request() {
        let transport = Arc::new(MockTransport::new());
        transport.shall_fail("https://x", "connection refused");

        let err = requester(&transport)
            .request("POST", "https://x", &QueryOptions::new())
            .await
            .unwrap_err();
        let outcome = err.outcome().unwrap();

        assert_eq!(outcome.method, Method::Post);
        assert!(outcome.has_error(ErrorKind::FailedRequest));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.status, None);
        assert!(outcome.raw_body.is_none());
        assert!(outcome.parsed_resp.is_none());
        assert_eq!(outcome.raw_error.as_deref(), Some("connection refused"));
    }
}
