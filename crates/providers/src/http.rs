use std::time::Duration;

use factory_core::ProviderSystem;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{ProviderError, Result};

/// Per-call provider timeout.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("platform-factory/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

pub(crate) fn require<'a>(
    system: ProviderSystem,
    value: &'a Option<String>,
    name: &str,
) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProviderError::configuration(system, format!("{} is not set", name)))
}

pub(crate) async fn send(system: ProviderSystem, request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::request(system, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_status(system, status, &body))
}

/// Like [`send`], but a 404 is an answer ("does not exist") rather than an error.
pub(crate) async fn send_optional(
    system: ProviderSystem,
    request: RequestBuilder,
) -> Result<Option<Response>> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::request(system, e))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if status.is_success() {
        return Ok(Some(response));
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_status(system, status, &body))
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    system: ProviderSystem,
    response: Response,
) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::transient(system, format!("unreadable response: {}", e)))
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    system: ProviderSystem,
    request: RequestBuilder,
) -> Result<T> {
    let response = send(system, request).await?;
    read_json(system, response).await
}
