// Session lifecycle: sign-in and sign-out against one server/site pair.

use std::fmt;

use reqwest::StatusCode;
use tracing::debug;

use crate::api::{check_status, ApiClient};
use crate::error::Result;
use crate::xml::{self, Credentials, SignInRequest, SiteRef, TS_NAMESPACE};

/// An authenticated session. The token is an opaque secret valid only
/// against the server/site pair that issued it; `Debug` redacts it and it
/// must never be logged.
#[derive(Clone)]
pub struct Session {
    server: String,
    token: String,
    site_id: String,
    site_content_url: String,
    user_id: String,
}

impl Session {
    /// Server base URL the token was issued by.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn site_content_url(&self) -> &str {
        &self.site_content_url
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("server", &self.server)
            .field("token", &"<redacted>")
            .field("site_id", &self.site_id)
            .field("site_content_url", &self.site_content_url)
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Manages sign-in/sign-out for one set of credentials on one server.
pub struct SessionMgr<'a> {
    client: &'a ApiClient,
    username: String,
    password: String,
    /// Site content URL to sign in to; empty selects the default site.
    site: String,
}

impl<'a> SessionMgr<'a> {
    pub fn new(client: &'a ApiClient, username: &str, password: &str, site: &str) -> Self {
        SessionMgr {
            client,
            username: username.to_string(),
            password: password.to_string(),
            site: site.to_string(),
        }
    }

    /// Sign in and return the session. Expects HTTP 200; a rejection is
    /// reported as an authentication error carrying the server's code,
    /// summary and detail.
    pub fn sign_in(&self) -> Result<Session> {
        let body = xml::to_xml(&SignInRequest {
            credentials: Credentials {
                name: self.username.clone(),
                password: self.password.clone(),
                site: SiteRef {
                    content_url: self.site.clone(),
                },
            },
        })?;

        let url = self.client.url("auth/signin");
        let response = self.client.post_xml(&url, body, None)?;
        let response =
            check_status(response, StatusCode::OK).map_err(|e| e.into_authentication())?;
        let data = xml::parse_sign_in(&response.text()?, TS_NAMESPACE)?;
        debug!(
            "signed in to {} (site '{}') as user {}",
            self.client.server(),
            data.site_content_url,
            data.user_id
        );

        Ok(Session {
            server: self.client.server().to_string(),
            token: data.token,
            site_id: data.site_id,
            site_content_url: data.site_content_url,
            user_id: data.user_id,
        })
    }

    /// Invalidate the session token. Expects HTTP 204. The remote service
    /// does not guarantee idempotency; callers run this as best-effort
    /// cleanup and treat failures as non-fatal.
    pub fn sign_out(&self, session: &Session) -> Result<()> {
        let url = self.client.url("auth/signout");
        let response = self.client.post_empty(&url, session.token())?;
        check_status(response, StatusCode::NO_CONTENT)?;
        debug!("signed out of {}", self.client.server());
        Ok(())
    }
}
