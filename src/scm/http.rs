use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::ScmError;

const USER_AGENT: &str = concat!("gogit/", env!("CARGO_PKG_VERSION"));

/// JSON REST plumbing shared by the provider clients.
pub(crate) struct RestApi {
    client: reqwest::Client,
    base: String,
    provider: &'static str,
}

impl RestApi {
    pub(crate) fn new(
        provider: &'static str,
        base: String,
        auth: Option<(HeaderName, String)>,
        timeout: Duration,
    ) -> Result<Self, ScmError> {
        let mut headers = HeaderMap::new();
        if let Some((name, value)) = auth {
            let mut value = HeaderValue::from_str(&value)
                .map_err(|_| ScmError::InvalidInput("token contains invalid characters".into()))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ScmError::provider(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            provider,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ScmError> {
        let resp = self.send(self.request(Method::GET, path).query(query)).await?;
        resp.json::<T>()
            .await
            .map_err(|e| {
                ScmError::provider(format!("failed to decode {} response: {}", self.provider, e))
            })
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<(), ScmError> {
        self.send(self.request(method, path).json(body)).await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ScmError> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ScmError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ScmError::provider(format!("{} request failed: {}", self.provider, e)))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let url = resp.url().path().to_string();
        let text = resp.text().await.unwrap_or_default();
        tracing::debug!(provider = self.provider, %status, url, "provider returned error status");
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(ScmError::not_found(format!("{} {}", self.provider, url)))
        } else {
            Err(ScmError::provider(format!(
                "{} API error: {} - {}",
                self.provider, status, text
            )))
        }
    }
}

/// Normalise a user-supplied server address to a scheme-qualified base URL.
pub(crate) fn server_base(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    }
}
