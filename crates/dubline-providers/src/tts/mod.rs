pub mod aliyun_native;
pub mod gradio;
pub mod openai_compatible;

use crate::error::TtsError;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub speaker_id: Option<String>,
    pub prompt_audio_url: Option<String>,
    /// Playback-rate multiplier passed through to the vendor's prosody
    /// control (§4.5): `1.0` is the vendor's natural pace.
    pub speed: f32,
}

impl Default for SynthesisRequest {
    fn default() -> Self {
        Self { text: String::new(), speaker_id: None, prompt_audio_url: None, speed: 1.0 }
    }
}

#[async_trait]
pub trait TtsProvider: Send + Sync + 'static {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, TtsError>;
}

/// A closed tagged-variant set: a new vendor is a new arm here and in
/// `build`, not a runtime-registered trait object.
pub enum TtsBackend {
    OpenaiCompatible(openai_compatible::OpenAiCompatibleTts),
    AliyunNative(aliyun_native::AliyunNativeTts),
    Gradio(gradio::GradioTts),
}

#[async_trait]
impl TtsProvider for TtsBackend {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, TtsError> {
        match self {
            TtsBackend::OpenaiCompatible(p) => p.synthesize(request).await,
            TtsBackend::AliyunNative(p) => p.synthesize(request).await,
            TtsBackend::Gradio(p) => p.synthesize(request).await,
        }
    }
}

pub fn build(settings: &dubline_config::TtsSettings) -> TtsBackend {
    match settings.backend {
        dubline_config::TtsBackend::OpenaiCompatible => {
            TtsBackend::OpenaiCompatible(openai_compatible::OpenAiCompatibleTts::new(settings.clone()))
        }
        dubline_config::TtsBackend::AliyunNative => {
            TtsBackend::AliyunNative(aliyun_native::AliyunNativeTts::new(settings.clone()))
        }
        dubline_config::TtsBackend::Gradio => {
            TtsBackend::Gradio(gradio::GradioTts::new(settings.clone()))
        }
    }
}

/// Maps the system's generic speaker aliases to a vendor's own voice IDs,
/// passing unknown IDs through unchanged so operators can use vendor-native
/// voice names directly.
pub fn map_speaker_alias<'a>(speaker_id: Option<&'a str>, table: &[(&'a str, &'a str)], default_voice: &'a str) -> String {
    let Some(id) = speaker_id else { return default_voice.to_string() };
    if id.is_empty() || id.eq_ignore_ascii_case("default") {
        return default_voice.to_string();
    }
    let lower = id.to_lowercase();
    table
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(&lower))
        .map(|(_, voice)| voice.to_string())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[(&str, &str)] = &[("male_young", "Alex"), ("female_young", "Cherry")];

    #[test]
    fn known_alias_maps_to_vendor_voice() {
        assert_eq!(map_speaker_alias(Some("male_young"), TABLE, "longxiaochun"), "Alex");
    }

    #[test]
    fn empty_or_default_uses_default_voice() {
        assert_eq!(map_speaker_alias(None, TABLE, "longxiaochun"), "longxiaochun");
        assert_eq!(map_speaker_alias(Some("default"), TABLE, "longxiaochun"), "longxiaochun");
    }

    #[test]
    fn unknown_alias_passes_through() {
        assert_eq!(map_speaker_alias(Some("Nofish"), TABLE, "longxiaochun"), "Nofish");
    }
}
