use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::ai::HttpInference;
use crate::attachments::record_receipt;
use crate::cli::{parse_exclude, parse_kind, today, Session};
use crate::error::{CuratelaError, Result};
use crate::fmt::{format_date_br, money};
use crate::importer::ImportTarget;
use crate::models::{Nature, NewTransaction};
use crate::scan::{build_candidates, extract_document, scan_receipt, ScanConfig};
use crate::storage::mime_for;

const DEFAULT_RECEIPT_CATEGORY: &str = "Outras Despesas";

pub async fn document(file: &str, account: &str, kind: &str, exclude: &[usize], yes: bool) -> Result<()> {
    let mut s = Session::open()?;
    let target = ImportTarget {
        account_id: s.state.account_by_name(account)?.id,
        kind: parse_kind(kind)?,
    };
    let service = HttpInference::from_settings(&s.settings)?;
    let cfg = ScanConfig::from(&s.settings);

    let path = Path::new(file);
    let bytes = std::fs::read(path)?;
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("documento");
    let names: Vec<String> = s.state.categories.iter().map(|c| c.name.clone()).collect();
    if names.is_empty() {
        return Err(CuratelaError::Validation(
            "No categories registered; create categories before importing".into(),
        ));
    }

    let rows = extract_document(&service, &cfg, filename, &bytes, mime_for(path), &names).await?;
    let mut batch = build_candidates(rows, &s.state.categories, today())?;

    let excluded = parse_exclude(exclude);
    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "Description", "Nature", "Category", "Suggested", "Value", ""]);
    for (i, r) in batch.rows.iter().enumerate() {
        let note = if excluded.contains(&i) {
            "excluded".dimmed().to_string()
        } else if r.category_mismatch {
            "category type differs".yellow().to_string()
        } else {
            String::new()
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(format_date_br(r.date)),
            Cell::new(&r.description),
            Cell::new(r.nature.as_str()),
            Cell::new(&r.category_name),
            Cell::new(&r.suggested_category),
            Cell::new(money(r.value)),
            Cell::new(note),
        ]);
    }
    println!("{table}");
    batch.remove_many(&excluded);
    println!("{} candidate(s), {} with a category mismatch", batch.rows.len(), batch.mismatches());

    if !yes {
        println!("Review only. Run again with --yes to import the remaining rows.");
        return Ok(());
    }
    let created = batch.confirm(&mut s.state, &s.store, target)?;
    println!("Imported {} transactions into {account}", created.len());
    Ok(())
}

pub async fn receipt(
    file: &str,
    account: &str,
    category: Option<&str>,
    kind: &str,
    description: Option<String>,
    yes: bool,
) -> Result<()> {
    let mut s = Session::open()?;
    let account_id = s.state.account_by_name(account)?.id;
    let kind = parse_kind(kind)?;
    let name = category.unwrap_or(DEFAULT_RECEIPT_CATEGORY).trim();
    let category_id = s
        .state
        .categories_for(Nature::Despesa)
        .find(|c| c.name.to_lowercase() == name.to_lowercase())
        .map(|c| c.id)
        .ok_or_else(|| CuratelaError::UnknownCategory(format!("{name} (DESPESA)")))?;

    let service = HttpInference::from_settings(&s.settings)?;
    let cfg = ScanConfig::from(&s.settings);
    let path = Path::new(file);
    let image = std::fs::read(path)?;
    let draft = scan_receipt(&service, &cfg, &image, mime_for(path), today()).await?;

    let description = description.unwrap_or_else(|| draft.description.clone());
    println!("Description: {description}");
    println!("Value:       {}", money(draft.value));
    println!(
        "Date:        {}{}",
        format_date_br(draft.date),
        if draft.date_substituted { " (not readable, using today)" } else { "" }
    );
    println!(
        "Image:       {}",
        if draft.cleaned_image.is_some() { "cleaned copy available" } else { "none" }
    );

    if !draft.has_value() {
        return Err(CuratelaError::Validation(
            "The receipt value could not be read; add it manually with `curatela transactions add`".into(),
        ));
    }
    if !yes {
        println!("Review only. Run again with --yes to save this expense.");
        return Ok(());
    }

    let new = NewTransaction {
        description,
        nature: Nature::Despesa,
        account_id,
        category_id,
        date: draft.date,
        value: draft.value,
        kind,
    };
    let txn = record_receipt(&mut s.state, &s.store, &s.bucket, new, draft.cleaned_image.as_deref()).await?;
    println!("Saved transaction {} with {} attachment(s)", txn.id, txn.attachments.len());
    Ok(())
}
