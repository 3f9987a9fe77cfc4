use chrono::NaiveDate;

use crate::ai::{ExtractedTransaction, InferenceService};
use crate::error::{CuratelaError, Result};
use crate::fmt::{parse_date_br, parse_date_iso, to_cents};
use crate::importer::{Candidate, ImportBatch, ImportTarget, RowStatus};
use crate::models::*;
use crate::retry::{with_retry, RetryPolicy};
use crate::settings::Settings;
use crate::state::AppState;
use crate::store::DataStore;

#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    pub inline_threshold: usize,
    pub analyze_policy: RetryPolicy,
    pub upload_policy: RetryPolicy,
}

impl From<&Settings> for ScanConfig {
    fn from(s: &Settings) -> Self {
        Self {
            inline_threshold: s.inline_threshold_bytes,
            analyze_policy: s.analyze_policy(),
            upload_policy: s.upload_policy(),
        }
    }
}

// ---------------------------------------------------------------------------
// Document extraction
// ---------------------------------------------------------------------------

/// Send a statement or invoice for extraction. Small files go inline first;
/// large files, or small ones whose inline attempt failed, are uploaded
/// through a pre-authorized handle and analyzed by storage path.
pub async fn extract_document<S: InferenceService>(
    service: &S,
    cfg: &ScanConfig,
    filename: &str,
    bytes: &[u8],
    mime_type: &str,
    categories: &[String],
) -> Result<Vec<ExtractedTransaction>> {
    if bytes.len() <= cfg.inline_threshold {
        match with_retry(cfg.analyze_policy, "analyze inline", || {
            service.analyze_inline(bytes, mime_type, categories)
        })
        .await
        {
            Ok(rows) => return Ok(rows),
            Err(e) => log::warn!(target: "scan", "inline analysis failed, uploading instead: {e}"),
        }
    } else {
        log::info!(
            target: "scan",
            "{filename} is {} bytes, above the inline limit; uploading",
            bytes.len()
        );
    }

    let handle = with_retry(cfg.upload_policy, "upload handle", || service.upload_handle(filename)).await?;
    with_retry(cfg.upload_policy, "upload", || service.upload(&handle, bytes, mime_type)).await?;
    with_retry(cfg.analyze_policy, "analyze stored", || {
        service.analyze_stored(&handle.path, mime_type, categories)
    })
    .await
}

/// Name match (case-insensitive), then the first category of the same type,
/// then the first category of any type.
pub fn resolve_category<'a>(categories: &'a [Category], name: &str, nature: Nature) -> Option<&'a Category> {
    let key = name.trim().to_lowercase();
    categories
        .iter()
        .find(|c| !key.is_empty() && c.name.to_lowercase() == key)
        .or_else(|| categories.iter().find(|c| c.category_type == nature))
        .or_else(|| categories.first())
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiCandidate {
    pub date: NaiveDate,
    pub description: String,
    pub value: f64,
    pub nature: Nature,
    pub category_id: i64,
    pub category_name: String,
    /// Category name as returned by the extractor.
    pub suggested_category: String,
    /// The resolved category's type differs from the nature.
    pub category_mismatch: bool,
}

impl Candidate for AiCandidate {
    fn status(&self) -> RowStatus {
        RowStatus::New
    }
}

fn parse_ai_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    parse_date_iso(raw).or_else(|| parse_date_br(raw))
}

/// Map extracted rows onto local categories. Fails when there is no category
/// at all to map onto.
pub fn build_candidates(
    rows: Vec<ExtractedTransaction>,
    categories: &[Category],
    today: NaiveDate,
) -> Result<ImportBatch<AiCandidate>> {
    if categories.is_empty() {
        return Err(CuratelaError::Validation(
            "No categories registered; create categories before importing".into(),
        ));
    }
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let nature = row.nature();
        let Some(category) = resolve_category(categories, &row.category, nature) else {
            continue;
        };
        let date = parse_ai_date(&row.date).unwrap_or_else(|| {
            log::warn!(target: "scan", "unreadable date '{}' for '{}', using today", row.date, row.description);
            today
        });
        let category_mismatch = category.category_type != nature;
        if category_mismatch {
            log::warn!(
                target: "scan",
                "'{}' is {nature} but resolved to {} category '{}'",
                row.description,
                category.category_type,
                category.name
            );
        }
        out.push(AiCandidate {
            date,
            description: row.description.trim().to_string(),
            value: row.value.abs(),
            nature,
            category_id: category.id,
            category_name: category.name.clone(),
            suggested_category: row.category,
            category_mismatch,
        });
    }
    Ok(ImportBatch::new(out))
}

impl ImportBatch<AiCandidate> {
    pub fn mismatches(&self) -> usize {
        self.rows.iter().filter(|r| r.category_mismatch).count()
    }

    /// Persist every remaining candidate as one batch. Each row must pass the
    /// same checks as a manually entered transaction.
    pub fn confirm(&self, state: &mut AppState, store: &dyn DataStore, target: ImportTarget) -> Result<Vec<Transaction>> {
        if self.rows.is_empty() {
            return Err(CuratelaError::NoNewRows);
        }
        let mut batch = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let new = NewTransaction {
                description: row.description.clone(),
                nature: row.nature,
                account_id: target.account_id,
                category_id: row.category_id,
                date: row.date,
                value: row.value,
                kind: target.kind,
            };
            state.validate_transaction(&new).map_err(|e| {
                CuratelaError::Validation(format!("Row {}: {e} (exclude it or fix the category)", i + 1))
            })?;
            batch.push(new);
        }
        let created = state.add_transactions(store, &batch)?;
        log::info!(target: "scan", "imported {} extracted transactions", created.len());
        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptDraft {
    pub value: f64,
    pub date: NaiveDate,
    pub description: String,
    pub cleaned_image: Option<Vec<u8>>,
    /// The extracted date was unusable and today's date was put in its place.
    pub date_substituted: bool,
}

pub async fn scan_receipt<S: InferenceService>(
    service: &S,
    cfg: &ScanConfig,
    image: &[u8],
    mime_type: &str,
    today: NaiveDate,
) -> Result<ReceiptDraft> {
    let extracted = with_retry(cfg.analyze_policy, "receipt", || service.clean_receipt(image, mime_type)).await?;
    let parsed = parse_date_iso(extracted.date.trim());
    if parsed.is_none() {
        log::warn!(target: "scan", "receipt date '{}' unusable, using today", extracted.date);
    }
    Ok(ReceiptDraft {
        value: extracted.value.abs(),
        date: parsed.unwrap_or(today),
        description: extracted.description.trim().to_string(),
        cleaned_image: extracted.cleaned_image,
        date_substituted: parsed.is_none(),
    })
}

impl ReceiptDraft {
    pub fn has_value(&self) -> bool {
        to_cents(self.value) > 0
    }
}
