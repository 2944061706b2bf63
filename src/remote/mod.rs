use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::error::ScrapeError;

pub mod resolve;
pub mod rpc;

pub const DEFAULT_BASE_URL: &str = "https://photos.google.com/";

/// Browser user agent the remote expects on every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// The three kinds of HTTP exchange the scrape pipeline needs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` without following redirects and return the `Location` header, if any.
    async fn redirect_location(&self, url: &str) -> Result<Option<String>, ScrapeError>;

    /// GET `url`, following redirects, and return the body text.
    async fn fetch_text(&self, url: &str) -> Result<String, ScrapeError>;

    /// POST an already url-encoded form body and return the response text.
    async fn post_form(&self, url: &Url, body: String) -> Result<String, ScrapeError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    no_redirect: Client,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let no_redirect = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(Self { http, no_redirect })
    }

    pub fn build_form_request(&self, url: &Url, body: String) -> Result<reqwest::Request, reqwest::Error> {
        self.http
            .post(url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .build()
    }
}

fn http_error(url: &str, source: reqwest::Error) -> ScrapeError {
    ScrapeError::Http {
        url: url.to_string(),
        source,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn redirect_location(&self, url: &str) -> Result<Option<String>, ScrapeError> {
        let res = self
            .no_redirect
            .get(url)
            .send()
            .await
            .map_err(|e| http_error(url, e))?;
        debug!(%url, status = %res.status(), "share link response");
        if !res.status().is_redirection() {
            return Ok(None);
        }
        Ok(res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| http_error(url, e))?;
        if !res.status().is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: res.status().as_u16(),
            });
        }
        res.text().await.map_err(|e| http_error(url, e))
    }

    async fn post_form(&self, url: &Url, body: String) -> Result<String, ScrapeError> {
        let request = self
            .build_form_request(url, body)
            .map_err(|e| http_error(url.as_str(), e))?;
        let res = self
            .http
            .execute(request)
            .await
            .map_err(|e| http_error(url.as_str(), e))?;
        debug!(url = %url, status = %res.status(), "rpc response");
        // Error pages fail to decode downstream and degrade like any other bad reply.
        res.text().await.map_err(|e| http_error(url.as_str(), e))
    }
}
