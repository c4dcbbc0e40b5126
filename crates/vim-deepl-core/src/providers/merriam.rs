//! Merriam-Webster sd3 dictionary endpoint

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};

use super::DictionaryProvider;

const MW_SD3_ENDPOINT: &str = "https://www.dictionaryapi.com/api/v3/references/sd3/json/";

/// Merriam-Webster API client
pub struct MerriamWebster {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl MerriamWebster {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            endpoint: MW_SD3_ENDPOINT.to_string(),
        }
    }

    fn url_for(&self, term: &str, api_key: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| AppError::Provider(format!("MW endpoint url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Provider("MW endpoint url is not a base".to_string()))?
            .push(term);
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }
}

#[async_trait]
impl DictionaryProvider for MerriamWebster {
    async fn lookup(&self, term: &str) -> Result<serde_json::Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Provider("MW_SD3_API_KEY is not set.".to_string()))?;

        let url = self.url_for(term, api_key)?;
        let data: serde_json::Value = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Provider(format!("MW request error: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("MW request error: {e}")))?;

        if !data.is_array() {
            return Err(AppError::Provider("MW response is not a list.".to_string()));
        }
        Ok(data)
    }
}
