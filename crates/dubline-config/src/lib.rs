//! Configuration loading: environment variables, an optional file
//! (format auto-detected by extension), and `${VAR}` substitution applied
//! to file contents before parsing.

use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported config file extension: {0}")]
    UnsupportedFormat(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("config validation failed: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn detect_format(path: &str) -> ConfigResult<FileFormat> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_string()))?;
    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Substitutes `${VAR}` then `$VAR` references against the process
/// environment; unset variables are left as literal text.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let substituted = braced
        .replace_all(content, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string();

    let bare = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").unwrap();
    bare.replace_all(&substituted, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .to_string()
}

/// Loads `T` layering, in priority order: built-in defaults (via `Deserialize`
/// on a config with no sources beyond env), an optional config file, then
/// environment variables prefixed `DUBLINE_` with `__` as the nesting
/// separator (e.g. `DUBLINE_STORAGE__BACKEND`).
pub fn load<T>(file_path: Option<&str>) -> ConfigResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let mut builder = Cfg::builder();

    if let Some(path) = file_path {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&content);
        builder = builder.add_source(File::from_str(&substituted, format));
    }

    builder = builder.add_source(Environment::with_prefix("DUBLINE").separator("__"));

    let built = builder
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    built
        .try_deserialize()
        .map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Which object-store backend to use (§4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Minio,
    Oss,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub public_endpoint: Option<String>,
    pub public_domain: Option<String>,
    pub prefix: Option<String>,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default)]
    pub existing_bucket_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusSettings {
    pub url: String,
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
}

fn default_prefetch() -> u16 {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsrBackend {
    Volcengine,
    Aliyun,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsrSettings {
    pub backend: AsrBackend,
    pub base_url: String,
    pub app_key: Option<String>,
    pub access_key: Option<String>,
    pub resource_id: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default)]
    pub enable_itn: bool,
    #[serde(default)]
    pub enable_punc: bool,
    #[serde(default)]
    pub enable_speaker_info: bool,
    #[serde(default)]
    pub enable_emotion_detect: bool,
    #[serde(default)]
    pub enable_gender_detect: bool,
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_poll_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsBackend {
    OpenaiCompatible,
    AliyunNative,
    Gradio,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TtsSettings {
    pub backend: TtsBackend,
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_tts_model")]
    pub model: String,
}

fn default_tts_model() -> String {
    "qwen-tts-flash".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationSettings {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub storage: StorageSettings,
    pub bus: BusSettings,
    pub database: DatabaseSettings,
    pub asr: AsrSettings,
    pub tts: TtsSettings,
    pub translation: TranslationSettings,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

impl Settings {
    /// Fails fast on combinations that cannot possibly work, rather than
    /// surfacing a confusing error on first use.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage.backend == StorageBackend::Oss
            && (self.storage.public_domain.is_none() || self.storage.access_key.is_empty())
        {
            tracing::warn!(
                "storage backend 'oss' selected but public_domain/access_key missing; \
                 the storage factory will fall back to 'minio' at startup"
            );
        }
        if self.bus.prefetch == 0 {
            return Err(ConfigError::Invalid("bus.prefetch must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_format_known_extensions() {
        assert!(matches!(detect_format("x.toml"), Ok(FileFormat::Toml)));
        assert!(matches!(detect_format("x.yaml"), Ok(FileFormat::Yaml)));
        assert!(matches!(detect_format("x.json"), Ok(FileFormat::Json)));
        assert!(detect_format("x.txt").is_err());
    }

    #[test]
    fn substitute_env_vars_braced_and_bare() {
        unsafe {
            std::env::set_var("DUBLINE_TEST_VAR", "hello");
        }
        assert_eq!(substitute_env_vars("${DUBLINE_TEST_VAR}"), "hello");
        assert_eq!(substitute_env_vars("$DUBLINE_TEST_VAR"), "hello");
        assert_eq!(substitute_env_vars("${MISSING_FOR_SURE_XYZ}"), "${MISSING_FOR_SURE_XYZ}");
    }

    #[test]
    fn bus_prefetch_defaults_to_eight() {
        let toml = r#"
            [storage]
            backend = "minio"
            endpoint = "http://localhost:9000"
            access_key = "a"
            secret_key = "b"
            bucket = "dubline"

            [bus]
            url = "amqp://localhost:5672"

            [database]
            url = "postgres://localhost/dubline"

            [asr]
            backend = "aliyun"
            base_url = "https://dashscope.aliyuncs.com"

            [tts]
            backend = "aliyun_native"
            base_url = "https://dashscope.aliyuncs.com"

            [translation]
            base_url = "https://translate.example.com"
        "#;
        std::fs::write("/tmp/dubline_test_config.toml", toml).unwrap();
        let settings: Settings = load(Some("/tmp/dubline_test_config.toml")).unwrap();
        assert_eq!(settings.bus.prefetch, 8);
        assert_eq!(settings.database.max_connections, 10);
    }
}
