//! Subcommand implementations and the helpers they share.

pub mod analyze;
pub mod config_cmd;
pub mod formats;
pub mod generate;
pub mod sync;

use std::sync::Arc;

use promptscaffold_config::AppConfig;
use promptscaffold_core::{
    CustomFormat, FormatStore, LifecycleManager, Scaffold, SlotAnswer, SlotKey, Template,
    resolve_template,
};
use promptscaffold_storage::FileStore;
use tracing::debug;

/// Local key holding generated prompt history.
pub const CHATS_KEY: &str = "chats";
/// Local key holding user preferences.
pub const PREFERENCES_KEY: &str = "userPreferences";

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the local data store and register its teardown.
pub fn open_store(config: &AppConfig, lifecycle: &LifecycleManager) -> Arc<FileStore> {
    let store = Arc::new(FileStore::new(config.data_dir()));
    let dir = store.dir().display().to_string();
    lifecycle.register("file store", move || {
        debug!(dir = %dir, "Closing local data store");
    });
    store
}

pub fn open_formats(
    config: &AppConfig,
    lifecycle: &LifecycleManager,
) -> FormatStore<Arc<FileStore>> {
    FormatStore::open(open_store(config, lifecycle))
}

/// Resolve template ids, failing on the first unknown one.
pub fn resolve_templates(ids: &[String], custom: &[CustomFormat]) -> Result<Vec<Template>, String> {
    ids.iter()
        .map(|id| {
            resolve_template(id, custom).ok_or_else(|| {
                format!("Unknown template '{id}'. Run `promptscaffold templates` to list them.")
            })
        })
        .collect()
}

/// Parse `CODE=VALUE` (e.g. `L=golden hour`).
pub fn parse_answer(raw: &str) -> Result<SlotAnswer, String> {
    let (code, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Answer '{raw}' must look like CODE=VALUE"))?;
    let key = SlotKey::from_code(code.trim()).ok_or_else(|| {
        format!("Unknown slot code '{}'. Use one of S, C, St, Co, L, A, Q", code.trim())
    })?;
    Ok(SlotAnswer::new(key, value.trim()))
}

pub fn print_scaffold(scaffold: &Scaffold) {
    for slot in scaffold.slots() {
        let marker = if slot.required { "*" } else { " " };
        let content = if slot.is_filled() {
            slot.content.trim()
        } else {
            "—"
        };
        println!("  {marker}{:<12} {:<3} {content}", slot.name, slot.key.code());
    }
    let missing = scaffold.missing_required();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|k| k.name()).collect();
        println!();
        println!("   ⚠️  Required slots still empty: {}", names.join(", "));
    }
}
