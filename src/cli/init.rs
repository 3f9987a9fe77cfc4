use std::path::PathBuf;

use crate::error::Result;
use crate::settings::{load_file_settings, load_settings, save_settings, shellexpand_path, Settings};
use crate::store::{DataStore, SqliteStore};

fn apply_flags(settings: &mut Settings, data_dir: Option<&str>, ai_url: Option<&str>, ai_key: Option<&str>) {
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(dir);
    }
    if let Some(url) = ai_url {
        settings.ai_base_url = url.to_string();
    }
    if let Some(key) = ai_key {
        settings.ai_api_key = key.to_string();
    }
}

/// Environment overrides decide where this run works, but only the settings
/// file plus explicit flags are persisted.
pub fn run(data_dir: Option<String>, ai_url: Option<String>, ai_key: Option<String>) -> Result<()> {
    let (data_dir, ai_url, ai_key) = (data_dir.as_deref(), ai_url.as_deref(), ai_key.as_deref());

    let mut settings = load_settings();
    apply_flags(&mut settings, data_dir, ai_url, ai_key);
    let mut persisted = load_file_settings();
    apply_flags(&mut persisted, data_dir, ai_url, ai_key);

    let dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&dir)?;
    std::fs::create_dir_all(settings.bucket_dir())?;
    let store = SqliteStore::open(&settings.db_path())?;
    save_settings(&persisted)?;

    let categories = store.list_categories()?.len();
    log::info!(target: "init", "initialized {}", dir.display());
    println!("Data directory: {}", dir.display());
    println!("Database:       {}", settings.db_path().display());
    println!("Categories:     {categories}");
    if settings.ai_base_url.is_empty() {
        println!("AI service:     (not configured; pass --ai-url to enable scanning and questions)");
    } else {
        println!("AI service:     {}", settings.ai_base_url);
    }
    Ok(())
}
