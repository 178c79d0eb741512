//! Browser-style session transport.
//!
//! The archive authenticates like a web browser: a form login seeds a
//! session cookie, and every state-changing request must carry an
//! anti-forgery token plus a `Referer` header. The server uses Django
//! session authentication, which requires a valid CSRF token for any POST,
//! PUT, PATCH or DELETE; the token is scraped fresh from the API root for
//! each mutating call.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use regex::Regex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, REFERER};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::ApiError;
use crate::{user_agent, VERSION_HEADER, VERSION_SUPPORTED};

/// Default timeout for non-upload calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Generous ceiling for a single chunk upload. Should never be hit; it
/// exists so a caller's eager deadline cannot truncate a long chunk.
pub const UPLOAD_CHUNK_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Name of the mutating-request token header.
const CSRF_HEADER: &str = "X-CSRFTOKEN";

/// Session-cookie HTTP client for the archive.
///
/// Owns the cookie jar for the process lifetime. Cloneable handles are not
/// provided; the façade owns one `Session` (inside [`crate::VaultApi`]) and
/// shares it behind an `Arc`.
#[derive(Debug)]
pub struct Session {
    endpoint: String,
    username: String,
    password: String,
    state: RwLock<SessionState>,
    csrf_token_pattern: Regex,
    login_token_pattern: Regex,
}

#[derive(Debug)]
struct SessionState {
    client: Client,
    jar: Arc<Jar>,
}

impl Session {
    /// Creates a session against `endpoint` (the API root, e.g.
    /// `https://vault.example.org/api`; a trailing slash is tolerated).
    pub fn new(endpoint: &str, username: &str, password: &str) -> Result<Self, ApiError> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        // Anything shorter than "http://a.to" cannot be a usable endpoint.
        if endpoint.len() < 11 || Url::parse(&endpoint).is_err() {
            return Err(ApiError::InvalidEndpoint);
        }
        let jar = Arc::new(Jar::default());
        let client = build_client(&jar)?;
        Ok(Self {
            endpoint,
            username: username.to_string(),
            password: password.to_string(),
            state: RwLock::new(SessionState { client, jar }),
            csrf_token_pattern: Regex::new(r#"csrfToken:\s*"([^"]*)""#).expect("static pattern"),
            login_token_pattern: Regex::new(
                r#"name="csrfmiddlewaretoken"[^>]*value="([^"]*)""#,
            )
            .expect("static pattern"),
        })
    }

    /// Normalized API root, without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Site root with the `/api` suffix stripped; login and the deposit API
    /// live outside the `/api` prefix.
    pub fn site_root(&self) -> &str {
        self.endpoint.strip_suffix("/api").unwrap_or(&self.endpoint)
    }

    fn login_url(&self) -> String {
        format!("{}/accounts/login/", self.site_root())
    }

    fn endpoint_url(&self) -> Url {
        Url::parse(&self.endpoint).expect("endpoint validated at construction")
    }

    /// A clone of the current HTTP client (carries the session cookies).
    pub fn client(&self) -> Client {
        self.state.read().unwrap().client.clone()
    }

    /// One-time login exchange.
    ///
    /// Fetches the HTML login page, lifts the hidden `csrfmiddlewaretoken`
    /// input, seeds the `csrftoken` cookie, and posts the credentials with a
    /// `Referer` equal to the login URL. After a successful login the jar
    /// holds both the `csrftoken` and the session cookie.
    pub async fn login(&self) -> Result<(), ApiError> {
        let login_url = self.login_url();
        let client = self.client();

        let page = client.get(&login_url).send().await?.text().await?;
        let token = self
            .login_token_pattern
            .captures(&page)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(ApiError::MissingCsrfToken)?;

        {
            let state = self.state.read().unwrap();
            state
                .jar
                .add_cookie_str(&format!("csrftoken={token}"), &self.endpoint_url());
        }

        let resp = client
            .post(&login_url)
            .header(REFERER, &login_url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
                ("csrfmiddlewaretoken", token.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status.as_u16() >= 400 {
            return Err(ApiError::LoginFailed(format!("got HTTP {status}")));
        }
        if body.contains("Your username and password didn't match") {
            return Err(ApiError::LoginFailed(
                "username and password did not match".into(),
            ));
        }

        let cookies = self.cookie_count();
        if cookies < 2 {
            return Err(ApiError::LoginFailed(format!(
                "expected 2 cookies, got {cookies}"
            )));
        }
        debug!(cookies, "vault login complete");
        Ok(())
    }

    /// Drops the session by replacing the client and its cookie jar.
    pub fn logout(&self) -> Result<(), ApiError> {
        let jar = Arc::new(Jar::default());
        let client = build_client(&jar)?;
        let mut state = self.state.write().unwrap();
        *state = SessionState { client, jar };
        Ok(())
    }

    fn cookie_count(&self) -> usize {
        let state = self.state.read().unwrap();
        match state.jar.cookies(&self.endpoint_url()) {
            Some(header) => header
                .to_str()
                .map(|s| s.split("; ").filter(|c| !c.is_empty()).count())
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Scrapes a fresh anti-forgery token from the API root.
    ///
    /// Resource endpoints return JSON, not HTML, so the bare API root is
    /// the one place the token reliably appears.
    pub async fn csrf_token(&self) -> Result<String, ApiError> {
        let body = self
            .client()
            .get(&self.endpoint)
            .header(ACCEPT, "text/html")
            .send()
            .await?
            .text()
            .await?;
        self.csrf_token_pattern
            .captures(&body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or(ApiError::MissingCsrfToken)
    }

    /// Reads the advertised API version from the API root; empty when the
    /// header is absent (the server may be proxied).
    pub async fn version(&self) -> String {
        let resp = match self.client().get(&self.endpoint).send().await {
            Ok(resp) => resp,
            Err(_) => return String::new(),
        };
        resp.headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// Fails with [`ApiError::VersionMismatch`] when the server advertises a
    /// version other than the supported one.
    pub async fn check_version(&self) -> Result<(), ApiError> {
        let server = self.version().await;
        if !server.is_empty() && server != VERSION_SUPPORTED {
            return Err(ApiError::VersionMismatch {
                server,
                supported: VERSION_SUPPORTED.to_string(),
            });
        }
        Ok(())
    }

    /// A request builder for a read-only call.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client().request(method, url)
    }

    /// A request builder for a state-changing call: carries a freshly
    /// scraped `X-CSRFTOKEN` and the `Referer`.
    pub async fn mutating_request(
        &self,
        method: Method,
        url: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let token = self.csrf_token().await?;
        Ok(self
            .client()
            .request(method, url)
            .header(CSRF_HEADER, token)
            .header(REFERER, &self.endpoint))
    }
}

fn build_client(jar: &Arc<Jar>) -> Result<Client, ApiError> {
    Ok(Client::builder()
        .cookie_provider(Arc::clone(jar))
        .timeout(DEFAULT_TIMEOUT)
        .user_agent(user_agent())
        .build()?)
}

/// Checks the response status and decodes the JSON body.
pub(crate) async fn expect_json<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json().await?)
}

/// Checks the response status, discarding the body.
pub(crate) async fn expect_ok(resp: reqwest::Response) -> Result<(), ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN_PAGE: &str = concat!(
        r#"<form method="post"><input type="hidden" name="csrfmiddlewaretoken" "#,
        r#"value="CCBQ9qqG3ylgR1MaYBc6UCw4tlxR7rhP"></form>"#
    );

    async fn mount_login(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/accounts/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts/login/"))
            .and(header("Referer", format!("{}/accounts/login/", server.uri())))
            .and(body_string_contains("csrfmiddlewaretoken=CCBQ9qqG3ylgR1MaYBc6UCw4tlxR7rhP"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "sessionid=some-session-id; Path=/"),
            )
            .mount(server)
            .await;
    }

    fn session_for(server: &MockServer) -> Session {
        Session::new(&format!("{}/api", server.uri()), "admin", "hunter2").unwrap()
    }

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(matches!(
            Session::new("", "u", "p"),
            Err(ApiError::InvalidEndpoint)
        ));
        assert!(matches!(
            Session::new("http://a", "u", "p"),
            Err(ApiError::InvalidEndpoint)
        ));
    }

    #[test]
    fn endpoint_is_normalized() {
        let session = Session::new("http://vault.example.org/api/", "u", "p").unwrap();
        assert_eq!(session.endpoint(), "http://vault.example.org/api");
        assert_eq!(session.site_root(), "http://vault.example.org");
    }

    #[tokio::test]
    async fn login_sets_both_cookies() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        let session = session_for(&server);
        session.login().await.unwrap();
        assert!(session.cookie_count() >= 2);
    }

    #[tokio::test]
    async fn login_fails_without_hidden_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>no form</html>"))
            .mount(&server)
            .await;

        let session = session_for(&server);
        let err = session.login().await.unwrap_err();
        assert!(matches!(err, ApiError::MissingCsrfToken));
    }

    #[tokio::test]
    async fn login_reports_credential_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts/login/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>Your username and password didn't match.</p>"),
            )
            .mount(&server)
            .await;

        let session = session_for(&server);
        let err = session.login().await.unwrap_err();
        assert!(matches!(err, ApiError::LoginFailed(_)));
    }

    #[tokio::test]
    async fn csrf_token_scrape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<script>var config = { csrfToken: "tok-123" };</script>"#),
            )
            .mount(&server)
            .await;

        let session = session_for(&server);
        assert_eq!(session.csrf_token().await.unwrap(), "tok-123");
    }

    #[tokio::test]
    async fn csrf_token_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let session = session_for(&server);
        assert!(matches!(
            session.csrf_token().await,
            Err(ApiError::MissingCsrfToken)
        ));
    }

    #[tokio::test]
    async fn version_gate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200).insert_header(VERSION_HEADER, "3"))
            .mount(&server)
            .await;

        let session = session_for(&server);
        assert_eq!(session.version().await, "3");
        let err = session.check_version().await.unwrap_err();
        assert!(matches!(err, ApiError::VersionMismatch { .. }));
    }

    #[tokio::test]
    async fn version_gate_tolerates_missing_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let session = session_for(&server);
        assert_eq!(session.version().await, "");
        session.check_version().await.unwrap();
    }

    #[tokio::test]
    async fn mutating_request_carries_token_and_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"csrfToken: "fresh-token""#),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/collections/"))
            .and(header("X-CSRFTOKEN", "fresh-token"))
            .and(header("Referer", format!("{}/api", server.uri())))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server);
        let url = format!("{}/collections/", session.endpoint());
        let builder = session.mutating_request(Method::POST, &url).await.unwrap();
        let resp = builder.send().await.unwrap();
        assert_eq!(resp.status().as_u16(), 201);
    }

    #[tokio::test]
    async fn logout_drops_cookies() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        let session = session_for(&server);
        session.login().await.unwrap();
        assert!(session.cookie_count() >= 2);
        session.logout().unwrap();
        assert_eq!(session.cookie_count(), 0);
    }
}
