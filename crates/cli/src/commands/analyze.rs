//! `promptscaffold analyze` and `promptscaffold render`.

use promptscaffold_core::{LifecycleManager, analyze as analyze_text, render as render_body};

use super::{load_config, open_formats, print_scaffold, resolve_templates};

pub async fn analyze(text: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let scaffold = analyze_text(text, None);

    if json {
        println!("{}", serde_json::to_string_pretty(&scaffold)?);
        return Ok(());
    }

    println!("🧩 Scaffold ({}/7 slots filled)", scaffold.filled_count());
    println!();
    print_scaffold(&scaffold);
    Ok(())
}

pub async fn render(
    text: &str,
    templates: &[String],
    body: Option<&str>,
    lifecycle: &LifecycleManager,
) -> Result<(), Box<dyn std::error::Error>> {
    let scaffold = analyze_text(text, None);

    if let Some(body) = body {
        println!("{}", render_body(&scaffold, body));
        return Ok(());
    }

    let config = load_config()?;
    let ids = if templates.is_empty() {
        config.output.templates.clone()
    } else {
        templates.to_vec()
    };
    let formats = open_formats(&config, lifecycle);
    let resolved = resolve_templates(&ids, formats.list())?;

    for template in &resolved {
        println!("🎨 {} ({})", template.name, template.id);
        println!("   {}", template.render(&scaffold));
        println!();
    }
    Ok(())
}
