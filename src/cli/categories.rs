use comfy_table::{Cell, Table};

use crate::cli::{parse_exclude, parse_nature, row_label, Session};
use crate::error::{CuratelaError, Result};
use crate::importer::{read_grid, validate_categories, RowStatus};
use crate::models::NewCategory;

pub fn add(name: &str, category_type: &str) -> Result<()> {
    let mut s = Session::open()?;
    let created = s.state.add_category(
        &s.store,
        NewCategory {
            name: name.to_string(),
            category_type: parse_nature(category_type)?,
        },
    )?;
    println!("Added category: {} ({})", created.name, created.category_type);
    Ok(())
}

pub fn list(category_type: Option<&str>) -> Result<()> {
    let s = Session::open()?;
    let filter = category_type.map(parse_nature).transpose()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type"]);
    for c in s
        .state
        .categories
        .iter()
        .filter(|c| filter.map_or(true, |t| c.category_type == t))
    {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(&c.name),
            Cell::new(c.category_type.as_str()),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}

pub fn update(id: i64, name: Option<String>, category_type: Option<String>) -> Result<()> {
    let mut s = Session::open()?;
    let mut cat = s
        .state
        .category(id)
        .cloned()
        .ok_or_else(|| CuratelaError::UnknownCategory(id.to_string()))?;
    if let Some(n) = name {
        cat.name = n.trim().to_string();
    }
    if let Some(t) = category_type {
        cat.category_type = parse_nature(&t)?;
    }
    s.state.update_category(&s.store, cat.clone())?;
    println!("Updated category {id}: {} ({})", cat.name, cat.category_type);
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let mut s = Session::open()?;
    let name = s
        .state
        .category(id)
        .map(|c| c.name.clone())
        .ok_or_else(|| CuratelaError::UnknownCategory(id.to_string()))?;
    s.state.delete_category(&s.store, id)?;
    println!("Deleted category: {name}");
    Ok(())
}

pub fn import(file: &str, exclude: &[usize], yes: bool) -> Result<()> {
    let mut s = Session::open()?;
    let grid = read_grid(std::path::Path::new(file))?;
    let mut batch = validate_categories(&grid, &s.state.categories);
    let excluded = parse_exclude(exclude);

    let mut table = Table::new();
    table.set_header(vec!["#", "Line", "Name", "Type", "Status", "Message"]);
    for (i, r) in batch.rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(r.line),
            Cell::new(&r.name),
            Cell::new(&r.raw_type),
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
    println!("Imported {} categories", created.len());
    Ok(())
}
