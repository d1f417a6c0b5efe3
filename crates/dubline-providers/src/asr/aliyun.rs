//! Aliyun DashScope Qwen ASR: a synchronous call that transcribes the whole
//! clip in one request and returns no per-utterance timestamps. The entire
//! transcript is reported as a single segment spanning the clip.

use super::{AsrResult, AsrSegment};
use crate::error::AsrError;
use dubline_config::AsrSettings;
use serde::Serialize;
use serde_json::Value;

const DASHSCOPE_PATH: &str = "/api/v1/services/audio/asr/transcription";

pub struct AliyunAsr {
    settings: AsrSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    model: &'a str,
    input: TranscribeInput<'a>,
    parameters: TranscribeParameters,
}

#[derive(Serialize)]
struct TranscribeInput<'a> {
    file_url: &'a str,
}

#[derive(Serialize)]
struct TranscribeParameters {
    enable_itn: bool,
    language: Option<String>,
}

impl AliyunAsr {
    pub fn new(settings: AsrSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    pub async fn recognize(&self, audio_url: &str, language: &str) -> Result<AsrResult, AsrError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| AsrError::Transient("asr.api_key not configured".into()))?;
        let model = self.settings.model.as_deref().unwrap_or("qwen3-asr-flash");

        let body = TranscribeRequest {
            model,
            input: TranscribeInput { file_url: audio_url },
            parameters: TranscribeParameters {
                enable_itn: self.settings.enable_itn,
                language: if language.is_empty() { None } else { Some(language.to_string()) },
            },
        };

        let resp = self
            .client
            .post(format!("{}{DASHSCOPE_PATH}", self.settings.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AsrError::Transient(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(AsrError::Transient(format!("{status}: {text}")));
            }
            return Err(AsrError::VendorTerminal { code: status.to_string(), message: text });
        }

        let parsed: Value = resp
            .json()
            .await
            .map_err(|e| AsrError::Transient(format!("malformed response: {e}")))?;

        Ok(parse_transcription(&parsed, language))
    }
}

/// Qwen's synchronous endpoint does not return timestamps, so the whole
/// transcript becomes one segment and the result is flagged degraded; the
/// caller decides whether that's acceptable for fan-out into per-segment TTS.
fn parse_transcription(body: &Value, fallback_language: &str) -> AsrResult {
    let text = body
        .pointer("/output/text")
        .or_else(|| body.pointer("/output/transcription"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let duration_ms = body.pointer("/output/duration_ms").and_then(Value::as_i64);

    let segments = if text.is_empty() {
        Vec::new()
    } else {
        vec![AsrSegment {
            idx: 0,
            start_ms: 0,
            end_ms: duration_ms.unwrap_or(0),
            text,
            speaker: None,
            emotion: None,
            gender: None,
        }]
    };

    AsrResult {
        language: body
            .pointer("/output/language")
            .and_then(Value::as_str)
            .unwrap_or(fallback_language)
            .to_string(),
        duration_ms,
        segments,
        single_segment_degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_transcript_becomes_single_segment() {
        let body = serde_json::json!({
            "output": {"text": "hola mundo", "language": "es", "duration_ms": 2500}
        });
        let result = parse_transcription(&body, "en");
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].end_ms, 2500);
        assert!(result.single_segment_degraded);
    }

    #[test]
    fn empty_transcript_yields_no_segments() {
        let body = serde_json::json!({"output": {"text": ""}});
        let result = parse_transcription(&body, "en");
        assert!(result.segments.is_empty());
    }
}
