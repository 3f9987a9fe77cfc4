use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{load_settings, settings_file_exists};
use crate::state::AppState;
use crate::store::{DataStore, SqliteStore};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    if !settings_file_exists() {
        println!("Settings:   (defaults, no settings file yet)");
    }
    println!(
        "AI service: {}",
        if settings.ai_base_url.is_empty() { "(not set)" } else { &settings.ai_base_url }
    );

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let store = SqliteStore::open(&db_path)?;
        let state = AppState::load(&store)?;
        let documents = store.list_documents()?.len();
        let attachments: usize = state.transactions.iter().map(|t| t.attachments.len()).sum();

        println!();
        println!("Accounts:      {}", state.accounts.len());
        println!("Categories:    {}", state.categories.len());
        println!("Transactions:  {}", state.transactions.len());
        println!("Attachments:   {attachments}");
        println!("Documents:     {documents}");
    } else {
        println!();
        println!("Database not found. Run `curatela init` to set up.");
    }

    Ok(())
}
