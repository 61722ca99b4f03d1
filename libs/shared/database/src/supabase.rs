use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin PostgREST client. Server-side callers authenticate with the project key.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", bearer))?);

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, &[]).await
    }

    /// Same as [`request`](Self::request) with extra headers such as
    /// `Prefer: return=representation`.
    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: &[(&'static str, &str)],
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        for &(name, value) in extra_headers {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_str(value)?);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let text = response.text().await?;
        // PostgREST answers 201/204 with an empty body unless asked for a representation.
        let data = if text.trim().is_empty() {
            serde_json::from_value(Value::Null)?
        } else {
            serde_json::from_str(&text)?
        };
        Ok(data)
    }

    /// `GET /rest/v1/{table}?{query}` decoded into rows.
    pub async fn select<T>(&self, table: &str, query: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?{}", table, query);
        self.request(Method::GET, &path, None, None).await
    }

    pub async fn insert(&self, table: &str, row: Value) -> Result<()> {
        let path = format!("/rest/v1/{}", table);
        let _: Value = self
            .request_with_headers(Method::POST, &path, None, Some(row), &[("prefer", "return=minimal")])
            .await?;
        Ok(())
    }

    /// PATCH rows matching `filter`, returning the rows that were changed.
    pub async fn update_returning<T>(&self, table: &str, filter: &str, patch: Value) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?{}", table, filter);
        self.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(patch),
            &[("prefer", "return=representation")],
        )
        .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
