use std::env;

use reqwest::Client;
use quiz_core::normalize::RawRecord;

use crate::error::RestSourceError;

#[derive(Clone, Debug)]
pub struct RestSourceConfig {
    pub base_url: String,
    pub api_key: String,
}

impl RestSourceConfig {
    /// Read the remote source configuration from the environment.
    /// Returns `None` when no API key is set, leaving the app on its local
    /// question cache.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("QUIZ_API_URL").ok()?;
        Some(Self { base_url, api_key })
    }
}

/// Fetches raw question rows from the hosted catalog API.
#[derive(Clone)]
pub struct RestQuestionSource {
    client: Client,
    config: Option<RestSourceConfig>,
}

impl RestQuestionSource {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(RestSourceConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<RestSourceConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Fetch every question row from the remote catalog.
    ///
    /// Rows come back untyped; normalization happens downstream so a single
    /// malformed row never fails the fetch.
    ///
    /// # Errors
    ///
    /// Returns `RestSourceError` when the source is disabled, the request
    /// fails, or the response status is not success.
    pub async fn fetch_all(&self) -> Result<Vec<RawRecord>, RestSourceError> {
        let config = self.config.as_ref().ok_or(RestSourceError::Disabled)?;

        let url = format!(
            "{}/rest/v1/questions?select=*",
            config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .header("apikey", &config.api_key)
            .bearer_auth(&config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RestSourceError::HttpStatus(response.status()));
        }

        let rows: Vec<RawRecord> = response.json().await?;
        tracing::debug!(rows = rows.len(), "fetched question rows");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_source_refuses_to_fetch() {
        let source = RestQuestionSource::new(None);
        assert!(!source.enabled());
    }
}
