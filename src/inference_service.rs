use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use crate::translate::interface::{GenerationOptions, TranslateResponse};

/// HTTP client for the model inference service
#[derive(Debug, Clone)]
pub struct InferenceServiceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
pub struct ModelTranslateRequest {
    pub text: String,
    pub src_lang: String,
    pub tgt_lang: String,
    pub max_length_factor: u32,
    pub generate: GenerationOptions,
}

impl InferenceServiceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build inference HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn translate(&self, request: &ModelTranslateRequest) -> Result<TranslateResponse> {
        let url = format!("{}/translate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let result: TranslateResponse = response.json().await?;
        Ok(result)
    }

    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }
}
