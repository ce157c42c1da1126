//! `promptscaffold generate` — the full analyze/enrich/render pipeline.

use std::path::{Path, PathBuf};

use promptscaffold_core::{
    Enrichment, FormatStore, GeneratedPrompt, KeyValueStore, LifecycleManager, PromptPipeline,
    SlotAnswer, apply_answers,
};
use promptscaffold_providers::gemini::to_data_url;
use tracing::warn;

use super::{CHATS_KEY, load_config, open_store, parse_answer, print_scaffold, resolve_templates};

pub struct GenerateOptions {
    pub images: Vec<PathBuf>,
    pub templates: Vec<String>,
    pub answers: Vec<String>,
    pub enhance: bool,
    pub json: bool,
}

pub async fn run(
    text: &str,
    options: GenerateOptions,
    lifecycle: &LifecycleManager,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let answers = options
        .answers
        .iter()
        .map(|a| parse_answer(a))
        .collect::<Result<Vec<SlotAnswer>, String>>()?;
    let images = options
        .images
        .iter()
        .map(|p| read_image(p))
        .collect::<Result<Vec<String>, String>>()?;

    let store = open_store(&config, lifecycle);
    let formats = FormatStore::open(store.clone());
    let ids = if options.templates.is_empty() {
        config.output.templates.clone()
    } else {
        options.templates.clone()
    };
    let templates = resolve_templates(&ids, formats.list())?;

    let mut pipeline = PromptPipeline::new(templates.clone())
        .with_retry(config.enrichment.retry_policy())
        .with_max_input_chars(config.analyzer.max_input_chars)
        .with_target_model(&config.output.target_model);
    if options.enhance {
        if let Some(enricher) = promptscaffold_providers::build_from_config(&config) {
            pipeline = pipeline.with_enricher(enricher);
        }
    }

    let mut output = pipeline.run(text, images, None).await;
    if !answers.is_empty() {
        let answered = apply_answers(output.prompt.scaffold(), &answers);
        output.prompt.replace_scaffold(answered);
        output.prompt.render_all(&templates);
    }

    if let Err(e) = append_history(&*store, &output.prompt) {
        warn!(error = %e, "Failed to save prompt history");
    }

    if options.json {
        let value = serde_json::json!({
            "id": output.prompt.id(),
            "scaffold": output.prompt.scaffold(),
            "outputs": output.prompt.formatted_outputs(),
            "enrichment": output.enrichment,
            "suggestions": output.suggestions,
            "questions": output.questions,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match &output.enrichment {
        Enrichment::Enhanced(text) => println!("✨ Enhanced: {text}"),
        Enrichment::HeuristicOnly => println!("🧩 Heuristic analysis only"),
    }
    println!();
    print_scaffold(output.prompt.scaffold());
    println!();

    for template in &templates {
        if let Some(rendered) = output.prompt.formatted(&template.id) {
            println!("🎨 {} ({})", template.name, template.id);
            println!("   {rendered}");
            println!();
        }
    }

    if !output.suggestions.is_empty() {
        println!("💡 Suggestions:");
        for s in &output.suggestions {
            println!("   • {s}");
        }
        println!();
    }

    if !output.questions.is_empty() {
        println!("❓ To refine, answer with --answer CODE=VALUE:");
        for q in &output.questions {
            println!("   [{}] {}", q.key.code(), q.question);
            if !q.options.is_empty() {
                println!("       options: {}", q.options.join(" | "));
            }
        }
    }

    Ok(())
}

/// Read an image file into a data URL.
fn read_image(path: &Path) -> Result<String, String> {
    let mime = mime_for(path)
        .ok_or_else(|| format!("Unsupported image type: {}", path.display()))?;
    let bytes =
        std::fs::read(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(to_data_url(mime, &bytes))
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// Append a prompt to the local history. Unreadable history starts over.
pub fn append_history(
    store: &dyn KeyValueStore,
    prompt: &GeneratedPrompt,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut history: Vec<serde_json::Value> = match store.get(CHATS_KEY)? {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding malformed prompt history");
            Vec::new()
        }),
        None => Vec::new(),
    };
    history.push(serde_json::to_value(prompt)?);
    store.set(CHATS_KEY, &serde_json::to_string(&history)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptscaffold_core::{MemoryStore, Scaffold};

    #[test]
    fn mime_by_extension() {
        assert_eq!(mime_for(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(mime_for(Path::new("b.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_for(Path::new("c.txt")), None);
        assert_eq!(mime_for(Path::new("noext")), None);
    }

    #[test]
    fn history_appends() {
        let store = MemoryStore::new();
        append_history(&store, &GeneratedPrompt::new("one", Scaffold::empty())).unwrap();
        append_history(&store, &GeneratedPrompt::new("two", Scaffold::empty())).unwrap();
        let history: Vec<serde_json::Value> =
            serde_json::from_str(&store.get(CHATS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1]["rawText"], "two");
    }

    #[test]
    fn malformed_history_starts_over() {
        let store = MemoryStore::new();
        store.set(CHATS_KEY, "garbage").unwrap();
        append_history(&store, &GeneratedPrompt::new("fresh", Scaffold::empty())).unwrap();
        let history: Vec<serde_json::Value> =
            serde_json::from_str(&store.get(CHATS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(history.len(), 1);
    }
}
