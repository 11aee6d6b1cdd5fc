use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tracing::info;

use crate::config::TranslatorConfig;
use crate::inference_service::InferenceServiceClient;
use super::client::RemoteTranslator;
use super::interface::TranslatorInterface;

/// Factory for creating translators
pub struct TranslatorFactory;

impl TranslatorFactory {
    /// Create the translator described by `config`
    pub fn create_translator(config: &TranslatorConfig) -> Result<Arc<dyn TranslatorInterface>> {
        let service = InferenceServiceClient::new(
            config.service_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        info!("Initializing translator backed by {}", service.base_url());

        Ok(Arc::new(RemoteTranslator::new(
            Arc::new(service),
            config.generation.clone(),
        )))
    }
}
