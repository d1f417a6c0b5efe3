//! Generic Gradio `gen_single` TTS endpoint (IndexTTS2-style apps). The
//! Gradio API takes a fixed 24-element positional array rather than named
//! fields, and can fetch remote prompt audio URLs itself.

use super::SynthesisRequest;
use crate::error::TtsError;
use dubline_config::TtsSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const EMO_CONTROL_SAME_AS_PROMPT: &str = "与音色参考音频相同";

pub struct GradioTts {
    settings: TtsSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GradioRequest {
    data: Vec<Value>,
    event_data: Option<Value>,
    fn_index: u32,
    session_hash: String,
}

#[derive(Deserialize)]
struct GradioResponse {
    data: Vec<Value>,
}

impl GradioTts {
    pub fn new(settings: TtsSettings) -> Self {
        Self { settings, client: reqwest::Client::new() }
    }

    fn build_params(&self, request: &SynthesisRequest) -> Vec<Value> {
        // gen_single's 24 positional slots have no playback-rate control,
        // so a non-default `speed` (set to fit the segment's target
        // window, see handlers::tts::estimate_speed) can't be honored here
        // the way the other two backends honor it.
        if request.speed != 1.0 {
            tracing::warn!(speed = request.speed, "gradio tts backend has no speed control; ignoring requested rate");
        }
        let mut data = vec![Value::Null; 24];
        data[0] = Value::String(EMO_CONTROL_SAME_AS_PROMPT.to_string());
        data[1] = match &request.prompt_audio_url {
            Some(url) => serde_json::json!({"path": url, "url": url, "meta": {"_type": "gradio.FileData"}}),
            None => Value::Null,
        };
        data[2] = Value::String(request.text.clone());
        data[3] = Value::Null; // emo_ref_path
        data[4] = serde_json::json!(0.8); // emo_weight
        for slot in data.iter_mut().take(13).skip(5) {
            *slot = serde_json::json!(0.0); // emotion vectors vec1-vec8
        }
        data[13] = Value::String(String::new()); // emo_text
        data[14] = Value::Bool(false); // emo_random
        data[15] = serde_json::json!(120); // max_text_tokens_per_sentence
        data[16] = Value::Bool(true); // do_sample
        data[17] = serde_json::json!(0.8); // top_p
        data[18] = serde_json::json!(30); // top_k
        data[19] = serde_json::json!(0.8); // temperature
        data[20] = serde_json::json!(0.0); // length_penalty
        data[21] = serde_json::json!(3); // num_beams
        data[22] = serde_json::json!(10.0); // repetition_penalty
        data[23] = serde_json::json!(1500); // max_mel_tokens
        data
    }

    async fn call_gen_single(&self, request: &SynthesisRequest, session_hash: &str) -> Result<String, TtsError> {
        let body = GradioRequest {
            data: self.build_params(request),
            event_data: None,
            fn_index: 0,
            session_hash: session_hash.to_string(),
        };

        let mut req = self
            .client
            .post(format!("{}/gradio_api/run/gen_single", self.settings.base_url.trim_end_matches('/')))
            .json(&body);
        if let Some(key) = &self.settings.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| TtsError::Transient(format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(TtsError::Transient(format!("{status}: {text}")));
            }
            return Err(TtsError::VendorTerminal(format!("{status}: {text}")));
        }

        let parsed: GradioResponse = resp
            .json()
            .await
            .map_err(|e| TtsError::Transient(format!("malformed gradio response: {e}")))?;

        let first = parsed
            .data
            .first()
            .ok_or_else(|| TtsError::VendorTerminal("gradio response had no data entries".into()))?;

        extract_download_url(first, &self.settings.base_url)
    }

    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, TtsError> {
        let session_hash = format!("session_{}", uuid::Uuid::new_v4().simple());
        let download_url = self.call_gen_single(request, &session_hash).await?;

        let mut dl = self.client.get(&download_url);
        if let Some(key) = &self.settings.api_key {
            dl = dl.bearer_auth(key);
        }
        let resp = dl.send().await.map_err(|e| TtsError::Transient(format!("download failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            if status.is_server_error() {
                return Err(TtsError::Transient(format!("download failed with status {status}")));
            }
            return Err(TtsError::VendorTerminal(format!("download failed with status {status}")));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| TtsError::Transient(format!("failed to read downloaded audio: {e}")))
    }
}

/// Gradio wraps the file value under `{visible, value: {FileData}, __type__}`
/// in some deployments and returns the raw `FileData` directly in others;
/// both shapes are tried before giving up.
fn extract_download_url(entry: &Value, base_url: &str) -> Result<String, TtsError> {
    let file_data = entry
        .get("value")
        .filter(|v| v.is_object())
        .unwrap_or(entry);

    if let Some(url) = file_data.get("url").and_then(Value::as_str) {
        if !url.is_empty() {
            return Ok(url.to_string());
        }
    }

    let path = file_data
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| TtsError::VendorTerminal("gradio response had no path or url".into()))?;

    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        Ok(format!("{base}{path}"))
    } else {
        Ok(format!("{base}/gradio_api/file={path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: String) -> TtsSettings {
        TtsSettings {
            backend: dubline_config::TtsBackend::Gradio,
            base_url,
            api_key: None,
            model: String::new(),
        }
    }

    #[test]
    fn builds_24_element_param_array() {
        let tts = GradioTts::new(settings("http://localhost:7860".into()));
        let request = SynthesisRequest { text: "hi".into(), speaker_id: None, prompt_audio_url: None, speed: 1.0 };
        let params = tts.build_params(&request);
        assert_eq!(params.len(), 24);
        assert_eq!(params[2], Value::String("hi".into()));
        assert_eq!(params[15], serde_json::json!(120));
    }

    #[test]
    fn extracts_url_from_wrapped_response() {
        let entry = serde_json::json!({"visible": true, "value": {"path": "/tmp/out.wav", "url": "http://h/file=/tmp/out.wav"}});
        let url = extract_download_url(&entry, "http://h").unwrap();
        assert_eq!(url, "http://h/file=/tmp/out.wav");
    }

    #[test]
    fn falls_back_to_constructed_url_when_missing() {
        let entry = serde_json::json!({"path": "out.wav"});
        let url = extract_download_url(&entry, "http://h").unwrap();
        assert_eq!(url, "http://h/gradio_api/file=out.wav");
    }

    #[tokio::test]
    async fn end_to_end_synthesize_downloads_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gradio_api/run/gen_single"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"path": "/tmp/gradio/out.wav", "url": format!("{}/file=/tmp/gradio/out.wav", server.uri())}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/file=/tmp/gradio/out.wav"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVEfmt ".to_vec()))
            .mount(&server)
            .await;

        let tts = GradioTts::new(settings(server.uri()));
        let request = SynthesisRequest { text: "hi".into(), speaker_id: None, prompt_audio_url: None, speed: 1.0 };
        let audio = tts.synthesize(&request).await.unwrap();
        assert!(audio.starts_with(b"RIFF"));
    }
}
