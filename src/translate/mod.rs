//! Translation pipeline: tag → detect unknown tokens → cache → generate.

pub mod cache;
pub mod deepseek;
pub mod detector;
pub mod dictionary;
pub mod json_cache;
pub mod sqlite_cache;
pub mod tagger;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::metrics::{metric_names, MetricsRegistry};
use cache::TranslationCache;
use detector::UnknownDetector;
use dictionary::Dictionary;
use tagger::{CaseMode, Tagger};

/// Natural-language generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, tagged: &str) -> Result<String, TranslateError>;
}

/// Terminal outcome of a translation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateOutcome {
    /// Part of the input was not recognised; nothing was generated or cached.
    Rejected { unknown: Vec<String> },
    Served { text: String, cached: bool },
}

#[derive(Debug)]
pub enum TranslateError {
    ApiError(String),
    Timeout,
    InvalidInput(String),
    /// No generator is configured and the tagged string was not cached.
    Unavailable,
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::ApiError(msg) => write!(f, "API error: {msg}"),
            TranslateError::Timeout => write!(f, "generation timeout"),
            TranslateError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            TranslateError::Unavailable => write!(f, "text generation is not configured"),
        }
    }
}

impl std::error::Error for TranslateError {}

pub struct TranslationService {
    tagger: Tagger,
    detector: UnknownDetector,
    cache: Arc<TranslationCache>,
    generator: Option<Arc<dyn TextGenerator>>,
    metrics: Arc<MetricsRegistry>,
}

impl TranslationService {
    pub fn new(
        dictionary: Arc<Dictionary>,
        cache: Arc<TranslationCache>,
        generator: Option<Arc<dyn TextGenerator>>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            detector: UnknownDetector::for_dictionary(&dictionary),
            tagger: Tagger::new(dictionary),
            cache,
            generator,
            metrics,
        }
    }

    pub fn cache(&self) -> &Arc<TranslationCache> {
        &self.cache
    }

    /// Run the full pipeline for one piece of source text.
    /// A tagged string is cached only after a successful generation.
    pub async fn translate(
        &self,
        text: &str,
        mode: CaseMode,
    ) -> Result<TranslateOutcome, TranslateError> {
        let span = self.metrics.span(metric_names::TAG);
        let tagged = self.tagger.tag(text, mode);
        let unknown = self.detector.find_unknown(&tagged);
        span.finish();

        if !unknown.is_empty() {
            info!(count = unknown.len(), "unknown tokens detected, rejecting");
            return Ok(TranslateOutcome::Rejected { unknown });
        }

        let span = self.metrics.span(metric_names::CACHE_LOOKUP);
        let hit = self.cache.get(&tagged);
        span.finish();

        if let Some(text) = hit {
            debug!(tagged = %tagged, "cache hit");
            return Ok(TranslateOutcome::Served { text, cached: true });
        }

        let generator = self.generator.as_ref().ok_or(TranslateError::Unavailable)?;
        debug!(tagged = %tagged, "cache miss, generating");

        let span = self.metrics.span(metric_names::GENERATE);
        let generated = generator.generate(&tagged).await;
        span.finish();

        let text = generated?;
        self.cache.put(tagged, text.clone());
        Ok(TranslateOutcome::Served {
            text,
            cached: false,
        })
    }
}
