//! DeepL translation endpoint

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

use super::{Translation, Translator};

const DEEPL_ENDPOINT: &str = "https://api-free.deepl.com/v2/translate";

/// DeepL API client
pub struct DeepL {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl DeepL {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            endpoint: DEEPL_ENDPOINT.to_string(),
        }
    }
}

#[async_trait]
impl Translator for DeepL {
    async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        context: Option<&str>,
    ) -> Result<Translation> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Provider("DEEPL_API_KEY is not set.".to_string()))?;

        let mut form: Vec<(&str, &str)> = vec![
            ("auth_key", api_key),
            ("text", text),
            ("target_lang", target_lang),
        ];
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            form.push(("context", ctx));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Provider(format!("DeepL request error: {e}")))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Provider(format!("DeepL request error: {e}")))?;

        let first = body
            .get("translations")
            .and_then(|t| t.as_array())
            .and_then(|t| t.first())
            .ok_or_else(|| AppError::Provider("DeepL empty response.".to_string()))?;

        Ok(Translation {
            text: first
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            detected_source_lang: first
                .get("detected_source_language")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }
}
