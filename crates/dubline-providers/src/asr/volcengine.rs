//! Volcengine (ByteDance) bigmodel ASR: submit a job, then poll for the
//! result. Status codes are returned as response headers, not body fields.

use super::{AsrResult, AsrSegment};
use crate::error::AsrError;
use dubline_config::AsrSettings;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

const SUBMIT_PATH: &str = "/api/v3/auc/bigmodel/submit";
const QUERY_PATH: &str = "/api/v3/auc/bigmodel/query";

const STATUS_DONE: &str = "20000000";
const STATUS_PROCESSING: &[&str] = &["20000001", "20000002"];

pub struct VolcengineAsr {
    settings: AsrSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    user: SubmitUser<'a>,
    audio: SubmitAudio<'a>,
    request: SubmitOptions,
}

#[derive(Serialize)]
struct SubmitUser<'a> {
    uid: &'a str,
}

#[derive(Serialize)]
struct SubmitAudio<'a> {
    format: &'a str,
    url: &'a str,
}

#[derive(Serialize)]
struct SubmitOptions {
    model_name: String,
    enable_itn: bool,
    enable_punc: bool,
    enable_speaker_info: bool,
    enable_emotion_detection: bool,
    enable_gender_detection: bool,
    show_utterances: bool,
}

impl VolcengineAsr {
    pub fn new(settings: AsrSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    fn app_key(&self) -> Result<&str, AsrError> {
        self.settings
            .app_key
            .as_deref()
            .ok_or_else(|| AsrError::Transient("asr.app_key not configured".into()))
    }

    fn access_key(&self) -> Result<&str, AsrError> {
        self.settings
            .access_key
            .as_deref()
            .ok_or_else(|| AsrError::Transient("asr.access_key not configured".into()))
    }

    fn resource_id(&self) -> Result<&str, AsrError> {
        self.settings
            .resource_id
            .as_deref()
            .ok_or_else(|| AsrError::Transient("asr.resource_id not configured".into()))
    }

    async fn submit(&self, audio_url: &str) -> Result<String, AsrError> {
        let request_id = Uuid::new_v4().to_string();
        let body = SubmitRequest {
            user: SubmitUser { uid: "dubline-worker" },
            audio: SubmitAudio { format: "wav", url: audio_url },
            request: SubmitOptions {
                model_name: "bigmodel".into(),
                enable_itn: self.settings.enable_itn,
                enable_punc: self.settings.enable_punc,
                enable_speaker_info: self.settings.enable_speaker_info,
                enable_emotion_detection: self.settings.enable_emotion_detect,
                enable_gender_detection: self.settings.enable_gender_detect,
                show_utterances: true,
            },
        };

        let resp = self
            .client
            .post(format!("{}{SUBMIT_PATH}", self.settings.base_url))
            .header("X-Api-App-Key", self.app_key()?)
            .header("X-Api-Access-Key", self.access_key()?)
            .header("X-Api-Resource-Id", self.resource_id()?)
            .header("X-Api-Request-Id", &request_id)
            .header("X-Api-Sequence", "-1")
            .json(&body)
            .send()
            .await
            .map_err(|e| AsrError::Transient(format!("submit request failed: {e}")))?;

        let status_code = resp
            .headers()
            .get("X-Api-Status-Code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let message = resp
            .headers()
            .get("X-Api-Message")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if status_code != STATUS_DONE {
            return Err(AsrError::VendorTerminal { code: status_code, message });
        }

        Ok(request_id)
    }

    async fn query(&self, request_id: &str) -> Result<Option<Value>, AsrError> {
        let resp = self
            .client
            .post(format!("{}{QUERY_PATH}", self.settings.base_url))
            .header("X-Api-App-Key", self.app_key()?)
            .header("X-Api-Access-Key", self.access_key()?)
            .header("X-Api-Resource-Id", self.resource_id()?)
            .header("X-Api-Request-Id", request_id)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| AsrError::Transient(format!("query request failed: {e}")))?;

        let status_code = resp
            .headers()
            .get("X-Api-Status-Code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let message = resp
            .headers()
            .get("X-Api-Message")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if status_code == STATUS_DONE {
            let body: Value = resp
                .json()
                .await
                .map_err(|e| AsrError::Transient(format!("malformed query response: {e}")))?;
            return Ok(Some(body));
        }

        if STATUS_PROCESSING.contains(&status_code.as_str()) {
            return Ok(None);
        }

        Err(AsrError::VendorTerminal { code: status_code, message })
    }

    pub async fn recognize(&self, audio_url: &str, language: &str) -> Result<AsrResult, AsrError> {
        let request_id = self.submit(audio_url).await?;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.settings.poll_timeout_secs);
        let poll_interval = Duration::from_secs(self.settings.poll_interval_secs);
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(AsrError::Timeout(Duration::from_secs(self.settings.poll_timeout_secs)));
            }
            match self.query(&request_id).await {
                Ok(Some(body)) => return Ok(parse_bigmodel_response(&body, language)),
                Ok(None) => {}
                Err(AsrError::Transient(msg)) => {
                    tracing::warn!(request_id, error = %msg, "transient error polling volcengine, retrying");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn parse_bigmodel_response(body: &Value, fallback_language: &str) -> AsrResult {
    let utterances = body
        .pointer("/result/utterances")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let segments = utterances
        .iter()
        .enumerate()
        .map(|(idx, u)| AsrSegment {
            idx: idx as i32,
            start_ms: u.get("start_time").and_then(Value::as_i64).unwrap_or(0),
            end_ms: u.get("end_time").and_then(Value::as_i64).unwrap_or(0),
            text: u.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
            speaker: u
                .pointer("/additions/speaker")
                .and_then(Value::as_str)
                .map(str::to_string),
            emotion: u
                .pointer("/additions/emotion")
                .and_then(Value::as_str)
                .map(str::to_string),
            gender: u
                .pointer("/additions/gender")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect();

    AsrResult {
        language: body
            .pointer("/result/language")
            .and_then(Value::as_str)
            .unwrap_or(fallback_language)
            .to_string(),
        duration_ms: body.pointer("/audio_info/duration").and_then(Value::as_i64),
        segments,
        single_segment_degraded: false,
    }
}
