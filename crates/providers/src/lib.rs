//! Enrichment provider implementations for PromptScaffold.
//!
//! All providers implement the `promptscaffold_core::Enricher` trait.
//! [`build_from_config`] selects and configures one from `AppConfig`.

pub mod gemini;
pub mod prompts;

use std::sync::Arc;

use promptscaffold_core::Enricher;
use tracing::{debug, info};

pub use gemini::GeminiProvider;

/// Build the configured enricher, or `None` when enrichment is off or no
/// API key is available.
pub fn build_from_config(config: &promptscaffold_config::AppConfig) -> Option<Arc<dyn Enricher>> {
    if !config.enrichment.enabled {
        debug!("Enrichment disabled in config");
        return None;
    }
    if !config.has_api_key() {
        info!("No API key configured, running heuristic analysis only");
        return None;
    }

    let api_key = config.api_key.clone().unwrap_or_default();
    let provider = GeminiProvider::with_timeout(api_key, config.enrichment.timeout())
        .with_base_url(&config.api_url)
        .with_model(&config.model)
        .with_temperature(config.enrichment.temperature);

    debug!(model = %config.model, "Gemini enricher configured");
    Some(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_means_no_enricher() {
        let config = promptscaffold_config::AppConfig::default();
        assert!(build_from_config(&config).is_none());
    }

    #[test]
    fn disabled_enrichment_wins_over_key() {
        let mut config = promptscaffold_config::AppConfig::default();
        config.api_key = Some("key".into());
        config.enrichment.enabled = false;
        assert!(build_from_config(&config).is_none());
    }

    #[test]
    fn key_builds_gemini() {
        let mut config = promptscaffold_config::AppConfig::default();
        config.api_key = Some("key".into());
        let enricher = build_from_config(&config).unwrap();
        assert_eq!(enricher.name(), "gemini");
    }
}
