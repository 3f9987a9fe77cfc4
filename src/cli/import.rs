use std::path::Path;

use comfy_table::{Cell, Table};

use crate::cli::{parse_exclude, parse_kind, row_label, Session};
use crate::error::Result;
use crate::fmt::{format_date_br, money};
use crate::importer::{read_grid, validate_transactions, ImportTarget, RowStatus};

pub async fn run(file: &str, account: &str, kind: &str, exclude: &[usize], yes: bool) -> Result<()> {
    let mut s = Session::open()?;
    let target = ImportTarget {
        account_id: s.state.account_by_name(account)?.id,
        kind: parse_kind(kind)?,
    };
    let grid = read_grid(Path::new(file))?;
    let mut batch = validate_transactions(&grid, &s.state, target, |pct| {
        log::debug!(target: "import", "validating {file}: {pct}%");
    })
    .await?;

    let excluded = parse_exclude(exclude);
    let mut table = Table::new();
    table.set_header(vec!["#", "Line", "Date", "Description", "Category", "Value", "Status", "Message"]);
    for (i, r) in batch.rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(r.line),
            Cell::new(r.date.map(format_date_br).unwrap_or_default()),
            Cell::new(&r.description),
            Cell::new(&r.category_name),
            Cell::new(r.value.map(money).unwrap_or_default()),
            Cell::new(row_label(r.status, excluded.contains(&i))),
            Cell::new(r.message.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
    batch.remove_many(&excluded);
    println!(
        "{} new, {} duplicate, {} invalid",
        batch.count(RowStatus::New),
        batch.count(RowStatus::Duplicate),
        batch.count(RowStatus::Invalid)
    );

    if !yes {
        println!("Review only. Run again with --yes to import the new rows.");
        return Ok(());
    }
    let created = batch.confirm(&mut s.state, &s.store)?;
    println!("Imported {} transactions into {account}", created.len());
    Ok(())
}
