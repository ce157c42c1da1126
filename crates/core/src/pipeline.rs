//! Prompt pipeline — raw text in, scaffold and rendered prompts out.
//!
//! ```text
//! input ─▶ cap length ─▶ analyze ─┬─▶ (enricher?) enhance ┐
//!                                 ├─▶ suggestions         ├─ join ─▶ merge ─▶ render
//!                                 └─▶ questions           ┘
//! ```
//!
//! Enrichment calls run concurrently, each under the retry policy. Their
//! failures are logged and never abort the run.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analyzer::analyze;
use crate::enrich::{ClarifyingQuestion, Enricher, Enrichment, EnrichmentRequest};
use crate::merge::{MergePolicy, merge};
use crate::prompt::GeneratedPrompt;
use crate::retry::{RetryPolicy, retry};
use crate::scaffold::Scaffold;
use crate::template::Template;

/// Default cap on analyzed input.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 2000;

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub prompt: GeneratedPrompt,
    pub enrichment: Enrichment,
    pub suggestions: Vec<String>,
    pub questions: Vec<ClarifyingQuestion>,
}

pub struct PromptPipeline {
    enricher: Option<Arc<dyn Enricher>>,
    retry: RetryPolicy,
    max_input_chars: usize,
    templates: Vec<Template>,
    target_model: Option<String>,
}

impl PromptPipeline {
    /// A heuristic-only pipeline rendering the given templates.
    pub fn new(templates: Vec<Template>) -> Self {
        Self {
            enricher: None,
            retry: RetryPolicy::default(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            templates,
            target_model: None,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = max;
        self
    }

    pub fn with_target_model(mut self, model: impl Into<String>) -> Self {
        self.target_model = Some(model.into());
        self
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Run the full flow over `text`, starting from `existing` if given.
    pub async fn run(
        &self,
        text: &str,
        images: Vec<String>,
        existing: Option<&Scaffold>,
    ) -> PipelineOutput {
        let input = cap_chars(text, self.max_input_chars);
        if input.len() < text.len() {
            debug!(max_chars = self.max_input_chars, "Pipeline: input truncated");
        }

        let heuristic = analyze(input, existing);
        debug!(filled = heuristic.filled_count(), "Pipeline: heuristic analysis done");

        let (enrichment, suggestions, questions) = match &self.enricher {
            Some(enricher) => {
                let request = EnrichmentRequest::new(input).with_images(images);
                self.enrich(enricher.as_ref(), &request, &heuristic).await
            }
            None => (Enrichment::HeuristicOnly, Vec::new(), Vec::new()),
        };

        let scaffold = match &enrichment {
            Enrichment::Enhanced(text) => {
                let enhanced = analyze(cap_chars(text, self.max_input_chars), None);
                merge(&heuristic, &enhanced, MergePolicy::FillEmpty)
            }
            Enrichment::HeuristicOnly => heuristic,
        };

        let mut prompt = GeneratedPrompt::new(input, scaffold);
        if let Some(model) = &self.target_model {
            prompt = prompt.with_target_model(model);
        }
        prompt.render_all(&self.templates);

        info!(
            prompt_id = prompt.id(),
            enhanced = enrichment.is_enhanced(),
            suggestions = suggestions.len(),
            questions = questions.len(),
            "Pipeline: prompt generated"
        );

        PipelineOutput {
            prompt,
            enrichment,
            suggestions,
            questions,
        }
    }

    async fn enrich(
        &self,
        enricher: &dyn Enricher,
        request: &EnrichmentRequest,
        scaffold: &Scaffold,
    ) -> (Enrichment, Vec<String>, Vec<ClarifyingQuestion>) {
        let (enhanced, suggestions, questions) = tokio::join!(
            retry(&self.retry, move || enricher.enhance(request)),
            retry(&self.retry, move || enricher.suggestions(request)),
            retry(&self.retry, move || enricher.clarifying_questions(scaffold)),
        );

        let enrichment = match enhanced {
            Ok(text) if !text.trim().is_empty() => Enrichment::Enhanced(text),
            Ok(_) => {
                warn!(enricher = enricher.name(), "Enhance returned empty text");
                Enrichment::HeuristicOnly
            }
            Err(e) => {
                warn!(enricher = enricher.name(), error = %e, "Enhance failed, using heuristic scaffold");
                Enrichment::HeuristicOnly
            }
        };

        let suggestions = suggestions.unwrap_or_else(|e| {
            warn!(enricher = enricher.name(), error = %e, "Suggestions failed");
            Vec::new()
        });
        let questions = questions.unwrap_or_else(|e| {
            warn!(enricher = enricher.name(), error = %e, "Clarifying questions failed");
            Vec::new()
        });

        (enrichment, suggestions, questions)
    }
}

/// Longest prefix of `text` with at most `max` characters.
fn cap_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
