use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Thin authenticated wrapper around the TMDB REST API. Built once at
/// startup with the bearer token baked into the default headers and shared
/// read-only across all requests.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| AppError::internal(format!("invalid TMDB API key: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let base_url = if base_url.is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim_end_matches('/').to_string()
        };

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issues one call against the API and returns the decoded JSON body.
    /// Non-2xx responses become external-service errors carrying the status
    /// and an excerpt of the body.
    pub async fn call(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
    ) -> Result<serde_json::Value> {
        let url = self.endpoint_url(path);
        let method: reqwest::Method = method
            .to_ascii_uppercase()
            .parse()
            .map_err(|_| AppError::bad_request(format!("unsupported HTTP method: {}", method)))?;

        let response = self
            .http
            .request(method.clone(), &url)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(AppError::external(
                "TMDB",
                format!("{} {} returned {}: {}", method, url, status, excerpt),
            ));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        let client = TmdbClient::new("test-key", "https://api.themoviedb.org/3/").unwrap();
        assert_eq!(
            client.endpoint_url("/search/movie"),
            "https://api.themoviedb.org/3/search/movie"
        );
        assert_eq!(
            client.endpoint_url("movie/550"),
            "https://api.themoviedb.org/3/movie/550"
        );
    }

    #[test]
    fn test_empty_base_url_falls_back_to_default() {
        let client = TmdbClient::new("test-key", "").unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_rejects_unrepresentable_key() {
        assert!(TmdbClient::new("bad\nkey", "").is_err());
    }
}
