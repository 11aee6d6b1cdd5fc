use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::inference_service::{InferenceServiceClient, ModelTranslateRequest};
use super::interface::{GenerationOptions, TranslateRequest, TranslatorInterface};
use super::languages::{resolve_source, resolve_target};

const UNKNOWN_TOKEN: &str = "<unk>";

/// Translator that forwards chunks to the inference service
pub struct RemoteTranslator {
    service: Arc<InferenceServiceClient>,
    default_generation: GenerationOptions,
}

impl RemoteTranslator {
    pub fn new(service: Arc<InferenceServiceClient>, default_generation: GenerationOptions) -> Self {
        Self {
            service,
            default_generation,
        }
    }

    /// Build the model request: language codes resolved, caller options
    /// layered over the configured defaults key by key
    pub fn model_request(&self, request: &TranslateRequest) -> ModelTranslateRequest {
        let source = resolve_source(&request.source_lang);
        let target = resolve_target(&request.target_lang);

        ModelTranslateRequest {
            text: request.text.clone(),
            src_lang: source.model_code.to_string(),
            tgt_lang: target.model_code.to_string(),
            max_length_factor: target.length_factor,
            generate: merge_options(&self.default_generation, &request.generate),
        }
    }
}

pub fn merge_options(defaults: &GenerationOptions, overrides: &GenerationOptions) -> GenerationOptions {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[async_trait]
impl TranslatorInterface for RemoteTranslator {
    async fn translate(&self, request: &TranslateRequest) -> Result<String, anyhow::Error> {
        if request.text.trim().is_empty() {
            return Ok(String::new());
        }

        let model_request = self.model_request(request);
        debug!(
            src = %model_request.src_lang,
            tgt = %model_request.tgt_lang,
            chars = request.text.chars().count(),
            "Sending translate request"
        );

        let response = self.service.translate(&model_request).await?;
        if !response.success {
            let error_msg = response.error.unwrap_or_else(|| "Unknown error".to_string());
            return Err(anyhow::anyhow!("Translation failed: {}", error_msg));
        }

        if response.translated_text.contains(UNKNOWN_TOKEN) {
            warn!(
                tgt = %model_request.tgt_lang,
                "Model output contains unknown tokens"
            );
        }

        Ok(response.translated_text)
    }

    async fn health_check(&self) -> bool {
        match self.service.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                debug!("Inference service health check failed: {}", e);
                false
            }
        }
    }
}
