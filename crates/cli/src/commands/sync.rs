//! `promptscaffold sync` — move user data between the local store and Drive.

use promptscaffold_config::AppConfig;
use promptscaffold_core::{
    FormatStore, KeyValueStore, LifecycleManager, RemoteStore, StorageErrorKind, UserData,
    UserPreferences,
};
use promptscaffold_storage::DriveStore;
use tracing::warn;

use super::{CHATS_KEY, PREFERENCES_KEY, load_config, open_store};

fn remote(config: &AppConfig) -> Result<DriveStore, Box<dyn std::error::Error>> {
    if !config.storage.remote_enabled {
        return Err("Remote storage is disabled. Set storage.remote_enabled = true in config.toml".into());
    }
    Ok(DriveStore::new(config.storage.access_token.clone()).with_retry(config.enrichment.retry_policy()))
}

/// Collect everything stored locally.
pub fn local_user_data(store: &dyn KeyValueStore) -> Result<UserData, Box<dyn std::error::Error>> {
    let formats = FormatStore::open(store);
    let chats = match store.get(CHATS_KEY)? {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Skipping malformed local history");
            Vec::new()
        }),
        None => Vec::new(),
    };
    let user_preferences = match store.get(PREFERENCES_KEY)? {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Using default preferences");
            UserPreferences::default()
        }),
        None => UserPreferences::default(),
    };

    Ok(UserData {
        chats,
        custom_formats: formats.list().to_vec(),
        user_preferences,
    })
}

/// Replace local data with `data`.
pub fn write_user_data(
    store: &dyn KeyValueStore,
    data: &UserData,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut formats = FormatStore::open(store);
    formats.replace_all(data.custom_formats.clone())?;
    store.set(CHATS_KEY, &serde_json::to_string(&data.chats)?)?;
    store.set(PREFERENCES_KEY, &serde_json::to_string(&data.user_preferences)?)?;
    Ok(())
}

fn explain(kind: StorageErrorKind) -> &'static str {
    match kind {
        StorageErrorKind::NoCredential => "Set PROMPTSCAFFOLD_DRIVE_TOKEN or storage.access_token",
        StorageErrorKind::Unauthorized => "The access token was rejected; sign in again",
        StorageErrorKind::Forbidden => "The token lacks the drive.appdata scope",
        StorageErrorKind::NotFound | StorageErrorKind::Other => "Try again later",
    }
}

pub async fn push(lifecycle: &LifecycleManager) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let drive = remote(&config)?;
    let store = open_store(&config, lifecycle);
    let data = local_user_data(&*store)?;

    println!("☁️  Uploading to Drive...");
    if let Err(e) = drive.save_all(&data).await {
        println!("   ❌ {e}");
        println!("   {}", explain(e.kind()));
        return Err(e.into());
    }
    println!(
        "   ✅ Pushed {} format(s), {} prompt(s), preferences",
        data.custom_formats.len(),
        data.chats.len()
    );
    Ok(())
}

pub async fn pull(lifecycle: &LifecycleManager) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let drive = remote(&config)?;
    let store = open_store(&config, lifecycle);

    println!("☁️  Downloading from Drive...");
    let data = match drive.load_all().await {
        Ok(data) => data,
        Err(e) => {
            println!("   ❌ {e}");
            println!("   {}", explain(e.kind()));
            return Err(e.into());
        }
    };

    write_user_data(&*store, &data)?;
    println!(
        "   ✅ Pulled {} format(s), {} prompt(s), preferences",
        data.custom_formats.len(),
        data.chats.len()
    );
    Ok(())
}
