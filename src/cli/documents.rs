use std::path::Path;

use comfy_table::{Cell, Table};

use crate::attachments;
use crate::cli::Session;
use crate::error::Result;
use crate::storage::ObjectStore;
use crate::store::DataStore;

pub async fn add(file: &str, title: &str) -> Result<()> {
    let s = Session::open()?;
    let bytes = std::fs::read(file)?;
    let filename = Path::new(file)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("documento");
    let doc = attachments::add_document(&s.store, &s.bucket, title, filename, &bytes).await?;
    println!("Stored document {}: {}", doc.id, doc.title);
    Ok(())
}

pub fn list() -> Result<()> {
    let s = Session::open()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Added", "Location"]);
    for d in s.store.list_documents()? {
        table.add_row(vec![
            Cell::new(d.id),
            Cell::new(&d.title),
            Cell::new(&d.created_at),
            Cell::new(s.bucket.public_url(&d.storage_path)),
        ]);
    }
    println!("Documents\n{table}");
    Ok(())
}

pub async fn delete(id: i64) -> Result<()> {
    let s = Session::open()?;
    let doc = attachments::delete_document(&s.store, &s.bucket, id).await?;
    println!("Deleted document {id}: {}", doc.title);
    Ok(())
}
