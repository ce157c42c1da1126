//! `promptscaffold config` — Configuration management commands.

use promptscaffold_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(&config)?);
    println!("# data_dir = {}", config.data_dir().display());
    Ok(())
}

/// The config as TOML with secrets masked.
fn redacted_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    if config.storage.access_token.is_some() {
        config.storage.access_token = Some("[REDACTED]".into());
    }
    toml::to_string_pretty(&config)
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = AppConfig::config_path();
    if path.exists() && !force {
        println!("   ⚠️  Config already exists at {}", path.display());
        println!("   Use --force to overwrite.");
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;

    println!("✅ Wrote default config to {}", path.display());
    println!("   Set PROMPTSCAFFOLD_API_KEY (or GEMINI_API_KEY) to enable enrichment.");
    Ok(())
}
