//! Aliyun DashScope's native text-to-speech generation endpoint — a
//! distinct surface from the OpenAI-compatible `/audio/speech` shape
//! (`openai_compatible.rs`): a nested `input`/`parameters` body, and,
//! unlike the OpenAI-compatible surface, genuine zero-shot voice cloning
//! via `parameters.prompt_audio_url`. This is the variant to pick when the
//! pipeline needs to clone a reference speaker rather than pick from a
//! fixed named-voice list.

use super::{map_speaker_alias, SynthesisRequest};
use crate::error::TtsError;
use dubline_config::TtsSettings;
use serde::Serialize;

const NATIVE_TTS_PATH: &str = "/api/v1/services/audio/text-to-speech/generation";

const VOICE_ALIASES: &[(&str, &str)] = &[
    ("male_young", "Alex"),
    ("female_young", "Cherry"),
    ("male_mature", "Ethan"),
    ("female_mature", "Serena"),
];
const DEFAULT_VOICE: &str = "longxiaochun";

pub struct AliyunNativeTts {
    settings: TtsSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SynthesisApiRequest<'a> {
    model: &'a str,
    input: SynthesisInput<'a>,
    parameters: SynthesisParameters<'a>,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SynthesisParameters<'a> {
    voice: &'a str,
    format: &'a str,
    rate: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_audio_url: Option<&'a str>,
}

impl AliyunNativeTts {
    pub fn new(settings: TtsSettings) -> Self {
        Self { settings, client: reqwest::Client::new() }
    }

    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, TtsError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| TtsError::Transient("tts.api_key not configured".into()))?;
        let voice = map_speaker_alias(request.speaker_id.as_deref(), VOICE_ALIASES, DEFAULT_VOICE);

        let body = SynthesisApiRequest {
            model: &self.settings.model,
            input: SynthesisInput { text: &request.text },
            parameters: SynthesisParameters {
                voice: &voice,
                format: "wav",
                rate: request.speed,
                prompt_audio_url: request.prompt_audio_url.as_deref(),
            },
        };

        let resp = self
            .client
            .post(format!("{}{NATIVE_TTS_PATH}", self.settings.base_url.trim_end_matches('/')))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TtsError::Transient(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(TtsError::Transient(format!("{status}: {text}")));
            }
            return Err(TtsError::VendorTerminal(format!("{status}: {text}")));
        }

        // Some DashScope deployments have been observed returning a JSON
        // error payload with a 200 status instead of a non-2xx response.
        // The Content-Type header is the documented way to tell audio from
        // an error body; this doesn't cover every deployment, so it's
        // logged rather than treated as a hard failure.
        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TtsError::Transient(format!("failed to read audio body: {e}")))?;

        if is_json {
            tracing::warn!("aliyun tts returned a 200 response with content-type application/json, not audio");
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: String) -> TtsSettings {
        TtsSettings {
            backend: dubline_config::TtsBackend::AliyunNative,
            base_url,
            api_key: Some("sk-test".into()),
            model: "qwen-tts-flash".into(),
        }
    }

    #[tokio::test]
    async fn maps_known_alias_and_returns_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(NATIVE_TTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVEfmt ".to_vec()))
            .mount(&server)
            .await;

        let tts = AliyunNativeTts::new(settings(server.uri()));
        let request = SynthesisRequest {
            text: "hola".into(),
            speaker_id: Some("female_young".into()),
            prompt_audio_url: None,
            speed: 1.0,
        };
        let audio = tts.synthesize(&request).await.unwrap();
        assert!(audio.starts_with(b"RIFF"));
    }

    /// Unlike the OpenAI-compatible variant, this vendor surface passes a
    /// supplied prompt audio URL through to `parameters.prompt_audio_url`
    /// for zero-shot voice cloning rather than dropping it.
    #[tokio::test]
    async fn prompt_audio_is_forwarded_for_voice_cloning() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(NATIVE_TTS_PATH))
            .and(wiremock::matchers::body_json(serde_json::json!({
                "model": "qwen-tts-flash",
                "input": {"text": "hola"},
                "parameters": {
                    "voice": "longxiaochun",
                    "format": "wav",
                    "rate": 1.0,
                    "prompt_audio_url": "https://example.com/voice.wav"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVEfmt ".to_vec()))
            .mount(&server)
            .await;

        let tts = AliyunNativeTts::new(settings(server.uri()));
        let request = SynthesisRequest {
            text: "hola".into(),
            speaker_id: None,
            prompt_audio_url: Some("https://example.com/voice.wav".into()),
            speed: 1.0,
        };
        assert!(tts.synthesize(&request).await.is_ok());
    }

    #[tokio::test]
    async fn json_content_type_on_200_is_logged_not_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(NATIVE_TTS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"code":"InternalError"}"#)
                    .insert_header("content-type", "application/json"),
            )
            .mount(&server)
            .await;

        let tts = AliyunNativeTts::new(settings(server.uri()));
        let request = SynthesisRequest { text: "hola".into(), speaker_id: None, prompt_audio_url: None, speed: 1.0 };
        assert!(tts.synthesize(&request).await.is_ok());
    }
}
