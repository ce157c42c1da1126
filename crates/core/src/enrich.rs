//! Enricher trait — the abstraction over the external generative-language API.
//!
//! An Enricher proposes improved prompt text, related suggestions, and
//! clarifying questions. Every call may fail; callers fall back to the
//! heuristic scaffold.
//!
//! Implementations: Gemini.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::scaffold::{Scaffold, SlotKey};

/// Input to an enrichment call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    /// The user's prompt text.
    pub prompt: String,

    /// Reference images as `data:<mime>;base64,<payload>` URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl EnrichmentRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// A question aimed at filling one scaffold slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyingQuestion {
    pub key: SlotKey,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Outcome of the enhancement step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Enrichment {
    /// The API proposed improved prompt text.
    Enhanced(String),
    /// Enrichment was unavailable or failed; only the heuristic analysis applies.
    HeuristicOnly,
}

impl Enrichment {
    pub fn is_enhanced(&self) -> bool {
        matches!(self, Enrichment::Enhanced(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Enrichment::Enhanced(text) => Some(text),
            Enrichment::HeuristicOnly => None,
        }
    }
}

/// The core Enricher trait.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// The enricher name (e.g., "gemini").
    fn name(&self) -> &str;

    /// Rewrite the prompt into a more detailed one.
    async fn enhance(&self, request: &EnrichmentRequest) -> Result<String, ProviderError>;

    /// Short alternative phrasings or additions.
    async fn suggestions(&self, request: &EnrichmentRequest) -> Result<Vec<String>, ProviderError> {
        let _ = request;
        Ok(Vec::new())
    }

    /// Questions for the slots the scaffold leaves empty.
    async fn clarifying_questions(
        &self,
        scaffold: &Scaffold,
    ) -> Result<Vec<ClarifyingQuestion>, ProviderError> {
        let _ = scaffold;
        Ok(Vec::new())
    }
}
