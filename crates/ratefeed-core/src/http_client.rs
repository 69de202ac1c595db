use std::collections::{BTreeMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// HTTP methods the feeds need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

/// Authentication strategy applied to outgoing HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuth {
    None,
    /// Raw `authorization` header value, e.g. `Basic ...`.
    Authorization(String),
    Header { name: String, value: String },
}

impl HttpAuth {
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::None => {}
            Self::Authorization(value) => {
                headers.insert(String::from("authorization"), value.clone());
            }
            Self::Header { name, value } => {
                headers.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
    }
}

/// HTTP request envelope used by feed transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: 15_000,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Apply the profile's headers, picking the user agent from `seed`.
    pub fn with_profile(mut self, profile: &HeaderProfile, seed: u64) -> Self {
        for (name, value) in profile.headers(seed) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// HTTP response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Transport contract used by every feed.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Browser-like request headers shared by a feed.
///
/// The profile is immutable; which user agent a request gets is a pure
/// function of the seed passed to [`HeaderProfile::user_agent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    user_agents: Vec<String>,
    headers: BTreeMap<String, String>,
}

impl HeaderProfile {
    /// Profile with the given user agents and no extra headers.
    ///
    /// An empty list falls back to the built-in desktop agents.
    pub fn new(user_agents: Vec<String>) -> Self {
        let user_agents = if user_agents.is_empty() {
            default_user_agents()
        } else {
            user_agents
        };
        Self {
            user_agents,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Headers a finance portal expects from a desktop browser.
    pub fn browser() -> Self {
        Self::new(default_user_agents())
            .with_header(
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .with_header("accept-language", "en-US,en;q=0.9")
            .with_header("cache-control", "no-cache")
            .with_header("pragma", "no-cache")
            .with_header("upgrade-insecure-requests", "1")
    }

    pub fn user_agent(&self, seed: u64) -> &str {
        let index = (seed % self.user_agents.len() as u64) as usize;
        &self.user_agents[index]
    }

    /// All headers for one request, user agent included.
    pub fn headers(&self, seed: u64) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        headers.insert(String::from("user-agent"), self.user_agent(seed).to_owned());
        headers
    }
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self::new(default_user_agents())
    }
}

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Production HTTP client using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    /// Client with a cookie store, so anti-bot cookies survive between attempts.
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .cookie_store(true)
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(&request.url),
            };

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            builder = builder.timeout(Duration::from_millis(request.timeout_ms));

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::new(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Offline transport replaying queued responses in order.
///
/// Once the script runs out every call fails with a transport error. Requests
/// are recorded for assertions.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new(script: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue one more response.
    pub fn push(&self, response: Result<HttpResponse, HttpError>) {
        self.script
            .lock()
            .expect("scripted client mutex poisoned")
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("scripted client mutex poisoned")
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .expect("scripted client mutex poisoned")
            .len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("scripted client mutex poisoned")
            .push(request);
        let next = self
            .script
            .lock()
            .expect("scripted client mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("script exhausted")));
        Box::pin(async move { next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_populates_header() {
        let request = HttpRequest::get("https://example.test/rates")
            .with_auth(&HttpAuth::Authorization(String::from("Basic abc=")));

        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Basic abc=")
        );
    }

    #[test]
    fn user_agent_selection_is_a_function_of_the_seed() {
        let profile = HeaderProfile::new(vec![String::from("agent-a"), String::from("agent-b")]);

        assert_eq!(profile.user_agent(0), "agent-a");
        assert_eq!(profile.user_agent(1), "agent-b");
        assert_eq!(profile.user_agent(2), "agent-a");
        assert_eq!(profile.user_agent(7), profile.user_agent(7));
    }

    #[test]
    fn profile_headers_are_lowercased_and_include_user_agent() {
        let profile = HeaderProfile::new(vec![String::from("agent-a")])
            .with_header("Referer", "https://portal.test/");
        let request = HttpRequest::get("https://portal.test/usd-rub").with_profile(&profile, 42);

        assert_eq!(
            request.headers.get("referer").map(String::as_str),
            Some("https://portal.test/")
        );
        assert_eq!(
            request.headers.get("user-agent").map(String::as_str),
            Some("agent-a")
        );
    }

    #[tokio::test]
    async fn scripted_client_fails_once_exhausted() {
        let client = ScriptedHttpClient::new([Ok(HttpResponse::ok("{}"))]);

        let first = client.execute(HttpRequest::get("https://a.test")).await;
        let second = client.execute(HttpRequest::get("https://b.test")).await;

        assert_eq!(first, Ok(HttpResponse::ok("{}")));
        assert!(second.is_err());
        assert_eq!(client.requests().len(), 2);
    }
}
