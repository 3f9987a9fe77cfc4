use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::attachments;
use crate::cli::{parse_date_arg, parse_date_opt, parse_kind, parse_nature, parse_value_arg, today, Session};
use crate::error::{CuratelaError, Result};
use crate::fmt::{format_date_br, money};
use crate::models::{Nature, NewTransaction, Transaction};
use crate::state::AppState;
use crate::storage::mime_for;

pub struct AddArgs {
    pub description: String,
    pub value: String,
    pub nature: String,
    pub account: String,
    pub category: String,
    pub date: Option<String>,
    pub kind: String,
    pub attach: Option<String>,
}

pub struct UpdateArgs {
    pub description: Option<String>,
    pub value: Option<String>,
    pub nature: Option<String>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub kind: Option<String>,
}

/// Resolve a category name among those allowed for `nature`.
fn category_for(state: &AppState, name: &str, nature: Nature) -> Result<i64> {
    let key = name.trim().to_lowercase();
    state
        .categories_for(nature)
        .find(|c| c.name.to_lowercase() == key)
        .map(|c| c.id)
        .ok_or_else(|| CuratelaError::UnknownCategory(format!("{} ({nature})", name.trim())))
}

fn read_file(path: &str) -> Result<(String, Vec<u8>)> {
    let bytes = std::fs::read(path)?;
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("arquivo")
        .to_string();
    Ok((name, bytes))
}

pub async fn add(args: AddArgs) -> Result<()> {
    let mut s = Session::open()?;
    let nature = parse_nature(&args.nature)?;
    let account_id = s.state.account_by_name(&args.account)?.id;
    let new = NewTransaction {
        description: args.description.trim().to_string(),
        nature,
        account_id,
        category_id: category_for(&s.state, &args.category, nature)?,
        date: parse_date_opt(&args.date)?.unwrap_or_else(today),
        value: parse_value_arg(&args.value)?,
        kind: parse_kind(&args.kind)?,
    };
    // Read the attachment before writing anything.
    let attachment = args.attach.as_deref().map(read_file).transpose()?;

    let txn = s.state.add_transaction(&s.store, new)?;
    println!("Added transaction {}: {} {}", txn.id, txn.description, money(txn.value));

    if let (Some((name, bytes)), Some(path)) = (attachment, args.attach.as_deref()) {
        let mime = mime_for(Path::new(path));
        let att = attachments::attach_file(&mut s.state, &s.store, &s.bucket, txn.id, &name, mime, &bytes).await?;
        println!("Attached {}", att.name);
    }
    Ok(())
}

pub fn list(
    account: Option<String>,
    kind: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
    limit: usize,
) -> Result<()> {
    let s = Session::open()?;
    let account_id = account
        .as_deref()
        .map(|a| s.state.account_by_name(a).map(|a| a.id))
        .transpose()?;
    let kind = kind.as_deref().map(parse_kind).transpose()?;
    let from = parse_date_opt(&from_date)?;
    let to = parse_date_opt(&to_date)?;

    let mut txns: Vec<&Transaction> = s
        .state
        .transactions
        .iter()
        .filter(|t| account_id.map_or(true, |a| t.account_id == a))
        .filter(|t| kind.map_or(true, |k| t.kind == k))
        .filter(|t| from.map_or(true, |f| t.date >= f))
        .filter(|t| to.map_or(true, |d| t.date <= d))
        .collect();
    txns.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Account", "Category", "Type", "Value", "Att."]);
    for t in txns.iter().take(limit) {
        let value = match t.nature {
            Nature::Receita => money(t.value).green().to_string(),
            Nature::Despesa => money(-t.value).red().to_string(),
        };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(format_date_br(t.date)),
            Cell::new(&t.description),
            Cell::new(s.state.account(t.account_id).map(|a| a.name.as_str()).unwrap_or("?")),
            Cell::new(s.state.category(t.category_id).map(|c| c.name.as_str()).unwrap_or("?")),
            Cell::new(t.kind.as_str()),
            Cell::new(value),
            Cell::new(if t.attachments.is_empty() { String::new() } else { t.attachments.len().to_string() }),
        ]);
    }
    println!("Transactions ({} of {})\n{table}", txns.len().min(limit), txns.len());
    Ok(())
}

pub fn update(id: i64, args: UpdateArgs) -> Result<()> {
    let mut s = Session::open()?;
    let mut txn = s
        .state
        .transaction(id)
        .cloned()
        .ok_or_else(|| CuratelaError::NotFound(format!("transaction {id}")))?;

    if let Some(d) = args.description {
        txn.description = d.trim().to_string();
    }
    if let Some(v) = args.value {
        txn.value = parse_value_arg(&v)?;
    }
    if let Some(n) = args.nature {
        txn.nature = parse_nature(&n)?;
    }
    if let Some(a) = args.account {
        txn.account_id = s.state.account_by_name(&a)?.id;
    }
    if let Some(c) = args.category {
        txn.category_id = category_for(&s.state, &c, txn.nature)?;
    }
    if let Some(d) = args.date {
        txn.date = parse_date_arg(&d)?;
    }
    if let Some(k) = args.kind {
        txn.kind = parse_kind(&k)?;
    }
    s.state.update_transaction(&s.store, txn)?;
    println!("Updated transaction {id}");
    Ok(())
}

pub async fn delete(id: i64) -> Result<()> {
    let mut s = Session::open()?;
    let removed = attachments::delete_transaction(&mut s.state, &s.store, &s.bucket, id).await?;
    println!("Deleted transaction {id}: {}", removed.description);
    if !removed.attachments.is_empty() {
        println!("Removed {} attachment(s)", removed.attachments.len());
    }
    Ok(())
}

pub async fn attach(id: i64, file: &str) -> Result<()> {
    let mut s = Session::open()?;
    let (name, bytes) = read_file(file)?;
    let mime = mime_for(Path::new(file));
    let att = attachments::attach_file(&mut s.state, &s.store, &s.bucket, id, &name, mime, &bytes).await?;
    println!("Attached {} to transaction {id}", att.name);
    Ok(())
}
