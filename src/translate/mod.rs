// Translation client seam
//
// - gemini: Google Gemini generateContent REST implementation

pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;

pub use gemini::GeminiTranslator;

use crate::config::TranslateConfig;
use crate::error::Result;
use crate::models::TranslationSettings;

/// Text translation through an external language model.
///
/// Credentials, model, prompt and temperature come from the batch's settings
/// snapshot. Implementations report a content-filter refusal as
/// `SafetyBlocked` and a reply without text as `EmptyResponse`, distinct from
/// transport errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, settings: &TranslationSettings) -> Result<String>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: &TranslateConfig) -> Result<Arc<dyn Translator>> {
        Ok(Arc::new(GeminiTranslator::new(config)?))
    }
}
