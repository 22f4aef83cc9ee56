//! A minimal client for the DuploCloud control-plane REST API.
//!
//! Handlers never talk HTTP directly: they go through the [`DuploApi`]
//! trait, which [`Client`] implements over `reqwest` and which tests
//! implement in memory. The trait is split by API area the same way the
//! control plane groups its endpoints.

mod error;
pub mod native_host;
pub mod plan;
pub mod replication_controller;
pub mod target_group;
pub mod tenant;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

pub use error::{ClientError, NO_STATUS};
pub use native_host::NativeHostApi;
pub use plan::PlanApi;
pub use replication_controller::ReplicationControllerApi;
pub use target_group::TargetGroupApi;
pub use tenant::TenantApi;

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Every control-plane API the provider's handlers use.
///
/// Implemented automatically for anything implementing each API area.
pub trait DuploApi:
    TenantApi + NativeHostApi + TargetGroupApi + ReplicationControllerApi + PlanApi + Send + Sync
{
}

impl<T> DuploApi for T where
    T: TenantApi
        + NativeHostApi
        + TargetGroupApi
        + ReplicationControllerApi
        + PlanApi
        + Send
        + Sync
{
}

/// HTTP client for a single DuploCloud control plane.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    host_url: String,
    token: String,
    user_account: Option<String>,
}

impl Client {
    /// Create a client with the default timeout and certificate checks on.
    pub fn new(host: &str, token: &str) -> Result<Self, ClientError> {
        Self::with_options(host, token, DEFAULT_HTTP_TIMEOUT, false)
    }

    /// Create a client with an explicit timeout and TLS verification mode.
    pub fn with_options(
        host: &str,
        token: &str,
        timeout: Duration,
        ssl_no_verify: bool,
    ) -> Result<Self, ClientError> {
        if host.is_empty() || token.is_empty() {
            return Err(ClientError::new(
                "missing provider config for 'duplo_token' 'duplo_host'. \
                 Not defined in environment var / main.tf",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(ssl_no_verify)
            .build()
            .map_err(|e| ClientError::io(host, &e))?;

        Ok(Self {
            http,
            host_url: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
            user_account: None,
        })
    }

    /// Send requests on behalf of the given user (the `DuploUser` header).
    pub fn with_user_account(mut self, user: impl Into<String>) -> Self {
        self.user_account = Some(user.into());
        self
    }

    /// The base URL of the control plane.
    pub fn host_url(&self) -> &str {
        &self.host_url
    }

    fn url(&self, api_path: &str) -> String {
        format!("{}/{}", self.host_url, api_path)
    }

    /// Send one request and return the raw body of a successful response.
    async fn send(
        &self,
        method: Method,
        api_name: &str,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<String, ClientError> {
        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json; charset=utf-8");
        if let Some(user) = &self.user_account {
            req = req.header("DuploUser", user);
        }
        if let Some(body) = body {
            req = req.body(body);
        }

        let res = req.send().await.map_err(|e| {
            trace!(api = api_name, error = %e, "request failed");
            ClientError::io(url, &e)
        })?;

        let status = res.status();
        if status.as_u16() > 300 {
            let path = res.url().path().to_string();
            let content_type = res
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let text = res
                .text()
                .await
                .unwrap_or_else(|_| "(read of body failed)".to_string());
            let err = ClientError::from_response(
                url,
                &path,
                status.as_u16(),
                content_type.as_deref(),
                &text,
            );
            trace!(api = api_name, error = %err, "failed");
            return Err(err);
        }

        let text = res.text().await.map_err(|e| ClientError::io(url, &e))?;
        trace!(api = api_name, url, response = %text, "received response");
        Ok(text)
    }

    async fn call<Rp: DeserializeOwned>(
        &self,
        method: Method,
        api_name: &str,
        api_path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Rp, ClientError> {
        let api_name = format!("{}API {}", method.as_str().to_lowercase(), api_name);
        let url = self.url(api_path);
        let text = self.send(method, &api_name, &url, body).await?;
        serde_json::from_str(&text).map_err(|e| {
            ClientError::app(
                &url,
                format!("{}: cannot unmarshal response from JSON: {}", api_name, e),
            )
        })
    }

    async fn call_nil(
        &self,
        method: Method,
        api_name: &str,
        api_path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<(), ClientError> {
        let api_name = format!("{}API {}", method.as_str().to_lowercase(), api_name);
        let url = self.url(api_path);
        let text = self.send(method, &api_name, &url, body).await?;
        match text.as_str() {
            "" | "null" | "\"\"" => Ok(()),
            other => Err(ClientError::app(
                &url,
                format!("{}: received unexpected response: {}", api_name, other),
            )),
        }
    }

    fn encode<Rq: Serialize + ?Sized>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> Result<Vec<u8>, ClientError> {
        let body = serde_json::to_vec(rq).map_err(|e| {
            ClientError::request(
                self.url(api_path),
                format!("{}: cannot marshal request to JSON: {}", api_name, e),
            )
        })?;
        trace!(api = api_name, path = api_path, "prepared request");
        Ok(body)
    }

    pub(crate) async fn get_api<Rp: DeserializeOwned>(
        &self,
        api_name: &str,
        api_path: &str,
    ) -> Result<Rp, ClientError> {
        self.call(Method::GET, api_name, api_path, None).await
    }

    pub(crate) async fn delete_api(&self, api_name: &str, api_path: &str) -> Result<(), ClientError> {
        let api_name = format!("deleteAPI {}", api_name);
        let url = self.url(api_path);
        // Deletes answer with the deleted object, null, or nothing at all.
        self.send(Method::DELETE, &api_name, &url, None)
            .await
            .map(|_| ())
    }

    pub(crate) async fn post_api<Rq: Serialize + ?Sized, Rp: DeserializeOwned>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> Result<Rp, ClientError> {
        let body = self.encode(api_name, api_path, rq)?;
        self.call(Method::POST, api_name, api_path, Some(body)).await
    }

    pub(crate) async fn post_api_nil<Rq: Serialize + ?Sized>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> Result<(), ClientError> {
        let body = self.encode(api_name, api_path, rq)?;
        self.call_nil(Method::POST, api_name, api_path, Some(body)).await
    }

    pub(crate) async fn put_api<Rq: Serialize + ?Sized, Rp: DeserializeOwned>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> Result<Rp, ClientError> {
        let body = self.encode(api_name, api_path, rq)?;
        self.call(Method::PUT, api_name, api_path, Some(body)).await
    }
}
