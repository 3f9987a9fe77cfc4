use comfy_table::{Cell, Table};

use crate::cli::Session;
use crate::error::Result;
use crate::store::DataStore;

pub fn run(limit: usize) -> Result<()> {
    let s = Session::open()?;
    let mut table = Table::new();
    table.set_header(vec!["When", "Action", "Entity", "ID", "Detail"]);
    for entry in s.store.list_activity(limit)? {
        table.add_row(vec![
            Cell::new(&entry.created_at),
            Cell::new(&entry.action),
            Cell::new(&entry.entity),
            Cell::new(entry.entity_id.map(|id| id.to_string()).unwrap_or_default()),
            Cell::new(&entry.detail),
        ]);
    }
    println!("Activity\n{table}");
    Ok(())
}
