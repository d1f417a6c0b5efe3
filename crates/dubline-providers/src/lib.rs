pub mod asr;
pub mod error;
pub mod translation;
pub mod tts;

pub use asr::{AsrBackend, AsrProvider, AsrResult, AsrSegment};
pub use error::{AsrError, TranslationError, TtsError};
pub use translation::{HttpTranslationProvider, TranslationProvider};
pub use tts::{SynthesisRequest, TtsBackend, TtsProvider};
