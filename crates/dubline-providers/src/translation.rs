//! A single HTTP-based machine translation provider, matching the one
//! vendor surface the worker talks to for text translation.

use crate::error::TranslationError;
use async_trait::async_trait;
use dubline_config::TranslationSettings;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait TranslationProvider: Send + Sync + 'static {
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, TranslationError>;
}

pub struct HttpTranslationProvider {
    settings: TranslationSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TranslateBatchRequest<'a> {
    texts: &'a [String],
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Deserialize)]
struct TranslateBatchResponse {
    translated_texts: Vec<String>,
}

impl HttpTranslationProvider {
    pub fn new(settings: TranslationSettings) -> Self {
        Self { settings, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl TranslationProvider for HttpTranslationProvider {
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, TranslationError> {
        let mut req = self
            .client
            .post(format!("{}/translate_batch", self.settings.base_url.trim_end_matches('/')))
            .json(&TranslateBatchRequest { texts, source_language, target_language });
        if let Some(key) = &self.settings.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| TranslationError::Transient(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(TranslationError::Transient(format!("{status}: {body}")));
            }
            return Err(TranslationError::VendorTerminal(format!("{status}: {body}")));
        }

        let parsed: TranslateBatchResponse = resp
            .json()
            .await
            .map_err(|e| TranslationError::Transient(format!("malformed response: {e}")))?;

        if parsed.translated_texts.len() != texts.len() {
            return Err(TranslationError::VendorTerminal(format!(
                "expected {} translations, got {}",
                texts.len(),
                parsed.translated_texts.len()
            )));
        }

        Ok(parsed.translated_texts)
    }
}

pub fn build(settings: &TranslationSettings) -> HttpTranslationProvider {
    HttpTranslationProvider::new(settings.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn translates_batch_and_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate_batch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"translated_texts": ["hello", "world"]})))
            .mount(&server)
            .await;

        let provider = HttpTranslationProvider::new(TranslationSettings { base_url: server.uri(), api_key: None });
        let texts = vec!["hola".to_string(), "mundo".to_string()];
        let out = provider.translate_batch(&texts, "es", "en").await.unwrap();
        assert_eq!(out, vec!["hello".to_string(), "world".to_string()]);
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate_batch"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = HttpTranslationProvider::new(TranslationSettings { base_url: server.uri(), api_key: None });
        let texts = vec!["hola".to_string()];
        let err = provider.translate_batch(&texts, "es", "en").await.unwrap_err();
        assert!(matches!(err, TranslationError::Transient(_)));
    }

    #[tokio::test]
    async fn client_error_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate_batch"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let provider = HttpTranslationProvider::new(TranslationSettings { base_url: server.uri(), api_key: None });
        let texts = vec!["hola".to_string()];
        let err = provider.translate_batch(&texts, "es", "en").await.unwrap_err();
        assert!(matches!(err, TranslationError::VendorTerminal(_)));
    }

    #[tokio::test]
    async fn mismatched_translation_count_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate_batch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"translated_texts": ["hello"]})))
            .mount(&server)
            .await;

        let provider = HttpTranslationProvider::new(TranslationSettings { base_url: server.uri(), api_key: None });
        let texts = vec!["hola".to_string(), "mundo".to_string()];
        let err = provider.translate_batch(&texts, "es", "en").await.unwrap_err();
        assert!(matches!(err, TranslationError::VendorTerminal(_)));
    }
}
