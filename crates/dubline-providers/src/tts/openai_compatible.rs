//! OpenAI-compatible `/audio/speech` TTS, used directly against OpenAI and
//! against any vendor that mirrors its wire contract.

use super::{map_speaker_alias, SynthesisRequest};
use crate::error::TtsError;
use dubline_config::TtsSettings;
use serde::Serialize;

const VOICE_ALIASES: &[(&str, &str)] = &[
    ("male_young", "echo"),
    ("female_young", "nova"),
    ("male_mature", "onyx"),
    ("female_mature", "shimmer"),
];
const DEFAULT_VOICE: &str = "alloy";

pub struct OpenAiCompatibleTts {
    settings: TtsSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    speed: f32,
}

impl OpenAiCompatibleTts {
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

        if request.prompt_audio_url.is_some() {
            tracing::warn!("openai-compatible tts does not support voice cloning, ignoring prompt_audio_url and using nominal voice {voice}");
        }

        let body = SpeechRequest {
            model: &self.settings.model,
            input: &request.text,
            voice: &voice,
            response_format: "wav",
            speed: request.speed,
        };

        let resp = self
            .client
            .post(format!("{}/audio/speech", self.settings.base_url.trim_end_matches('/')))
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

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| TtsError::Transient(format!("failed to read audio body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: String) -> TtsSettings {
        TtsSettings {
            backend: dubline_config::TtsBackend::OpenaiCompatible,
            base_url,
            api_key: Some("sk-test".into()),
            model: "tts-1".into(),
        }
    }

    #[tokio::test]
    async fn posts_to_audio_speech_and_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVEfmt ".to_vec()))
            .mount(&server)
            .await;

        let tts = OpenAiCompatibleTts::new(settings(server.uri()));
        let request = SynthesisRequest {
            text: "hello".into(),
            speaker_id: Some("male_young".into()),
            prompt_audio_url: None,
            speed: 1.0,
        };
        let audio = tts.synthesize(&request).await.unwrap();
        assert!(audio.starts_with(b"RIFF"));
    }

    #[tokio::test]
    async fn vendor_error_status_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad voice"))
            .mount(&server)
            .await;

        let tts = OpenAiCompatibleTts::new(settings(server.uri()));
        let request = SynthesisRequest { text: "hi".into(), speaker_id: None, prompt_audio_url: None, speed: 1.0 };
        let err = tts.synthesize(&request).await.unwrap_err();
        assert!(matches!(err, TtsError::VendorTerminal(_)));
    }

    #[tokio::test]
    async fn server_error_status_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let tts = OpenAiCompatibleTts::new(settings(server.uri()));
        let request = SynthesisRequest { text: "hi".into(), speaker_id: None, prompt_audio_url: None, speed: 1.0 };
        let err = tts.synthesize(&request).await.unwrap_err();
        assert!(matches!(err, TtsError::Transient(_)));
    }
}
