// Transport module: a small blocking HTTP client for the server REST API.
// It knows how to build versioned URLs, attach the auth-token header,
// send XML and multipart/mixed bodies, and turn unexpected statuses into
// typed errors carrying the server's error body.

use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::xml;

/// REST API version baked into every URL.
pub const API_VERSION: &str = "3.4";

/// Header carrying the session token on authenticated requests.
pub const AUTH_HEADER: &str = "X-Tableau-Auth";

/// Blocking API client bound to one server. It holds no credentials;
/// callers pass the session token per request.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for `server` with the given per-request timeout.
    pub fn new(server: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(ApiClient {
            http,
            base_url: server.trim_end_matches('/').to_string(),
        })
    }

    /// The server base URL this client talks to.
    pub fn server(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an API path, e.g. `url("auth/signin")`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, API_VERSION, path)
    }

    fn request(&self, method: Method, url: &str, token: Option<&str>) -> RequestBuilder {
        let mut req = self.http.request(method, url);
        if let Some(token) = token {
            req = req.header(AUTH_HEADER, token);
        }
        req
    }

    pub fn get(&self, url: &str, token: &str) -> Result<Response> {
        Ok(self.request(Method::GET, url, Some(token)).send()?)
    }

    pub fn delete(&self, url: &str, token: &str) -> Result<Response> {
        Ok(self.request(Method::DELETE, url, Some(token)).send()?)
    }

    /// POST an XML request body. `token` is absent only for sign-in.
    pub fn post_xml(&self, url: &str, body: String, token: Option<&str>) -> Result<Response> {
        Ok(self
            .request(Method::POST, url, token)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()?)
    }

    pub fn put_xml(&self, url: &str, body: String, token: &str) -> Result<Response> {
        Ok(self
            .request(Method::PUT, url, Some(token))
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()?)
    }

    /// POST with no body; used for sign-out and opening upload sessions.
    pub fn post_empty(&self, url: &str, token: &str) -> Result<Response> {
        Ok(self.request(Method::POST, url, Some(token)).send()?)
    }

    /// Send a multipart body with the `multipart/mixed` content type the
    /// publish endpoints expect (reqwest defaults to form-data, so the
    /// header is overridden while keeping the generated boundary).
    pub fn send_multipart(
        &self,
        method: Method,
        url: &str,
        token: &str,
        form: multipart::Form,
    ) -> Result<Response> {
        let content_type = format!("multipart/mixed; boundary={}", form.boundary());
        Ok(self
            .request(method, url, Some(token))
            .multipart(form)
            .header(CONTENT_TYPE, content_type)
            .send()?)
    }
}

/// Check a response against the single status the endpoint documents.
/// Anything else is parsed per the error-body contract and surfaced as an
/// `ApiCall` error; callers re-tag it where the taxonomy demands.
pub fn check_status(response: Response, expected: StatusCode) -> Result<Response> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().unwrap_or_default();
    debug!("request to {url} failed with status {status}");
    let parsed = xml::parse_error_body(&body);
    Err(ApiError::ApiCall {
        code: parsed.code,
        summary: parsed.summary,
        detail: parsed.detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_builder_inserts_version_and_trims_trailing_slash() {
        let client = ApiClient::new("https://analytics.example.com/", Duration::from_secs(30))
            .unwrap();
        assert_eq!(
            client.url("auth/signin"),
            "https://analytics.example.com/api/3.4/auth/signin"
        );
        assert_eq!(client.server(), "https://analytics.example.com");
    }
}
