//! `promptscaffold formats` and `promptscaffold templates`.

use std::path::Path;

use promptscaffold_core::{CustomFormat, FormatError, LifecycleManager, builtin_templates, validate_template};

use super::{load_config, open_formats};

pub async fn templates(lifecycle: &LifecycleManager) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let formats = open_formats(&config, lifecycle);

    println!("📐 Built-in templates");
    for t in builtin_templates() {
        println!("   {:<18} {:<18} {}", t.id, t.name, t.body);
    }

    println!();
    println!("🛠️  Custom formats ({})", formats.len());
    if formats.is_empty() {
        println!("   (none yet; add one with `promptscaffold formats add`)");
    }
    for f in formats.list() {
        println!("   {:<36} {:<18} {}", f.id, f.name, f.template);
    }
    Ok(())
}

pub async fn list(lifecycle: &LifecycleManager) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let formats = open_formats(&config, lifecycle);

    if formats.is_empty() {
        println!("   No custom formats.");
        return Ok(());
    }
    for f in formats.list() {
        print_format(f);
    }
    Ok(())
}

pub async fn add(
    name: &str,
    template: &str,
    lifecycle: &LifecycleManager,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut formats = open_formats(&config, lifecycle);

    match formats.create(name, template) {
        Ok(format) => {
            println!("✅ Saved format '{}' ({})", format.name, format.id);
            Ok(())
        }
        Err(FormatError::InvalidTemplate(validation)) => {
            println!("❌ Template is invalid:");
            for e in &validation.errors {
                println!("   • {e}");
            }
            Err("format not saved".into())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn delete(id: &str, lifecycle: &LifecycleManager) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut formats = open_formats(&config, lifecycle);

    if formats.delete(id)? {
        println!("🗑️  Deleted format {id}");
    } else {
        println!("   No format with id {id}");
    }
    Ok(())
}

pub async fn duplicate(
    id: &str,
    name: Option<&str>,
    lifecycle: &LifecycleManager,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut formats = open_formats(&config, lifecycle);

    match formats.duplicate(id, name)? {
        Some(copy) => println!("✅ Created '{}' ({})", copy.name, copy.id),
        None => println!("   No format with id {id}"),
    }
    Ok(())
}

pub async fn import(file: &Path, lifecycle: &LifecycleManager) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut formats = open_formats(&config, lifecycle);

    let json = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let report = formats.import(&json)?;

    println!(
        "📥 Imported {} format(s), {} failed",
        report.imported, report.failed
    );
    for e in &report.errors {
        println!("   ⚠️  {e}");
    }
    Ok(())
}

pub async fn export(
    output: Option<&Path>,
    lifecycle: &LifecycleManager,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let formats = open_formats(&config, lifecycle);
    let json = formats.export()?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)?;
            println!("📤 Exported {} format(s) to {}", formats.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub async fn search(query: &str, lifecycle: &LifecycleManager) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let formats = open_formats(&config, lifecycle);

    let results = formats.search(query);
    println!("🔍 {} match(es) for \"{query}\"", results.len());
    for f in results {
        print_format(f);
    }
    Ok(())
}

pub async fn validate(template: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = validate_template(template);
    if result.is_valid {
        println!("✅ Template is valid");
        return Ok(());
    }

    println!("❌ Template is invalid");
    for e in &result.errors {
        println!("   • {e}");
    }
    Err("invalid template".into())
}

fn print_format(f: &CustomFormat) {
    let status = if f.validation { "✅" } else { "⚠️ " };
    println!("{status} {} ({})", f.name, f.id);
    println!("     {}", f.template);
}
