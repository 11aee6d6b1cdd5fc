//! Fake translators for queue and route tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::interface::{TranslateRequest, TranslatorInterface};

/// Returns the text unchanged, or fails when it contains `fail_on`
#[derive(Default)]
pub struct EchoTranslator {
    pub calls: AtomicUsize,
    pub fail_on: Option<String>,
}

impl EchoTranslator {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(marker.to_string()),
        }
    }
}

#[async_trait]
impl TranslatorInterface for EchoTranslator {
    async fn translate(&self, request: &TranslateRequest) -> Result<String, anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_on {
            if request.text.contains(marker.as_str()) {
                anyhow::bail!("model rejected input containing {marker:?}");
            }
        }
        Ok(request.text.clone())
    }
}

/// Upper-cases text, but each call waits for a permit released by the test
pub struct GatedTranslator {
    pub gate: Arc<Semaphore>,
    pub started: AtomicUsize,
}

impl GatedTranslator {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            started: AtomicUsize::new(0),
        }
    }

    pub fn release(&self, calls: usize) {
        self.gate.add_permits(calls);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslatorInterface for GatedTranslator {
    async fn translate(&self, request: &TranslateRequest) -> Result<String, anyhow::Error> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await?;
        permit.forget();
        Ok(request.text.to_uppercase())
    }
}
