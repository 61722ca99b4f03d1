// libs/meeting-channel-cell/src/services/rest.rs
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::models::ChannelError;

/// Sends an authenticated JSON request.
///
/// `404` and `410` come back as `Ok(None)`: provider resources that do not
/// exist yet (or anymore) are an expected outcome, not a failure.
pub async fn send(
    client: &Client,
    method: Method,
    url: &str,
    bearer_token: &str,
    body: Option<&Value>,
) -> Result<Option<String>, ChannelError> {
    debug!("Sending {} request to: {}", method, url);

    let mut request = client
        .request(method.clone(), url)
        .header("Authorization", format!("Bearer {}", bearer_token));

    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        debug!("{} {} returned {}, treating as not found", method, url, status);
        return Ok(None);
    }

    let response_text = response.text().await?;

    if status == StatusCode::UNAUTHORIZED {
        error!("Provider rejected credentials for {} {}", method, url);
        return Err(ChannelError::Authentication { message: response_text });
    }

    if !status.is_success() {
        error!("Provider request failed: {} - {}", status, response_text);
        return Err(ChannelError::ProviderApi {
            status: Some(status.as_u16()),
            message: format!("HTTP {}: {}", status, response_text),
        });
    }

    Ok(Some(response_text))
}

pub fn parse<T: DeserializeOwned>(text: &str, what: &str) -> Result<T, ChannelError> {
    serde_json::from_str(text).map_err(|e| ChannelError::InvalidResponse {
        message: format!("Failed to parse {} response: {}", what, e),
    })
}

/// Turns a missing resource on a write path into an error.
pub fn require(found: Option<String>, what: &str) -> Result<String, ChannelError> {
    found.ok_or_else(|| ChannelError::ProviderApi {
        status: Some(404),
        message: format!("{} not found", what),
    })
}
