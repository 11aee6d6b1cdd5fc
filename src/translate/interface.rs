//! Translator interface; model inference lives in the external service

use async_trait::async_trait;
use serde::Deserialize;

/// Opaque generation options forwarded to the model, e.g. `num_beams`
pub type GenerationOptions = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone)]
pub struct TranslateRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub generate: GenerationOptions,
}

impl TranslateRequest {
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        generate: GenerationOptions,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            generate,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Text in, text out. Implementations must return an empty string for
/// blank input without running the model.
#[async_trait]
pub trait TranslatorInterface: Send + Sync {
    async fn translate(&self, request: &TranslateRequest) -> Result<String, anyhow::Error>;

    /// Whether the backing model is reachable
    async fn health_check(&self) -> bool {
        true
    }
}
