use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{CuratelaError, Result};
use crate::fmt::{fold_diacritics, parse_currency, parse_date_br, serial_to_date, to_cents};
use crate::models::*;
use crate::state::AppState;
use crate::store::DataStore;

/// Rows processed between cooperative yields during a transaction import.
pub const YIELD_EVERY: usize = 200;

// ---------------------------------------------------------------------------
// Cell grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Number(_) => false,
            Self::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// First row is the header.
pub type Grid = Vec<Vec<Cell>>;

fn cell(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&Cell::Empty)
}

fn row_is_blank(row: &[Cell]) -> bool {
    row.iter().all(Cell::is_blank)
}

/// Read a CSV or spreadsheet file into a grid, choosing the reader by
/// extension.
pub fn read_grid(path: &Path) -> Result<Grid> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => read_csv_grid(path),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook_grid(path),
        _ => Err(CuratelaError::Validation(format!(
            "Unsupported file type: {}",
            path.display()
        ))),
    }
}

pub fn read_csv_grid(path: &Path) -> Result<Grid> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut grid = Vec::new();
    for result in rdr.records() {
        let record = result?;
        grid.push(record.iter().map(csv_cell).collect());
    }
    Ok(grid)
}

fn plain_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("valid regex"))
}

/// Plain dot-decimal numbers are typed as numbers, the way a workbook reader
/// hands them over; anything else (PT-BR amounts, dates, names) stays text.
fn csv_cell(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if plain_number_re().is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<f64>() {
            return Cell::Number(n);
        }
    }
    Cell::from(raw)
}

#[cfg(feature = "xlsx")]
pub fn read_workbook_grid(path: &Path) -> Result<Grid> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| CuratelaError::Spreadsheet(format!("Failed to open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CuratelaError::Spreadsheet("Workbook has no worksheets".into()))?
        .map_err(|e| CuratelaError::Spreadsheet(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| {
            row.iter()
                .map(|c| match c {
                    Data::Empty => Cell::Empty,
                    Data::Float(f) => Cell::Number(*f),
                    Data::Int(i) => Cell::Number(*i as f64),
                    Data::DateTime(dt) => Cell::Number(dt.as_f64()),
                    Data::String(s) => Cell::from(s.as_str()),
                    other => Cell::Text(other.to_string()),
                })
                .collect()
        })
        .collect())
}

#[cfg(not(feature = "xlsx"))]
pub fn read_workbook_grid(path: &Path) -> Result<Grid> {
    Err(CuratelaError::Spreadsheet(format!(
        "Spreadsheet support is disabled in this build: {}",
        path.display()
    )))
}

// ---------------------------------------------------------------------------
// Row status and batches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    New,
    Duplicate,
    Invalid,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Duplicate => "duplicate",
            Self::Invalid => "invalid",
        }
    }
}

pub trait Candidate {
    fn status(&self) -> RowStatus;
}

/// Parsed rows awaiting review. Rows can be dropped before confirming; only
/// those still `New` are persisted.
#[derive(Debug, Clone)]
pub struct ImportBatch<C> {
    pub rows: Vec<C>,
}

impl<C: Candidate> ImportBatch<C> {
    pub fn new(rows: Vec<C>) -> Self {
        Self { rows }
    }

    /// Drop the row at `idx` (0-based). Out-of-range indices are ignored.
    pub fn remove(&mut self, idx: usize) -> Option<C> {
        (idx < self.rows.len()).then(|| self.rows.remove(idx))
    }

    /// Drop several rows given as 0-based indices in any order.
    pub fn remove_many(&mut self, indices: &[usize]) {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for idx in sorted.into_iter().rev() {
            self.remove(idx);
        }
    }

    pub fn count(&self, status: RowStatus) -> usize {
        self.rows.iter().filter(|r| r.status() == status).count()
    }
}

// ---------------------------------------------------------------------------
// Category import (two columns by position: name, type)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCandidate {
    /// 1-based line in the source file.
    pub line: usize,
    pub name: String,
    pub category_type: Option<Nature>,
    pub raw_type: String,
    pub status: RowStatus,
    pub message: Option<String>,
}

impl Candidate for CategoryCandidate {
    fn status(&self) -> RowStatus {
        self.status
    }
}

pub fn validate_categories(grid: &Grid, existing: &[Category]) -> ImportBatch<CategoryCandidate> {
    let mut known: HashSet<(String, Nature)> = existing
        .iter()
        .map(|c| (c.name.trim().to_lowercase(), c.category_type))
        .collect();

    let mut rows = Vec::new();
    for (i, row) in grid.iter().enumerate().skip(1) {
        if row_is_blank(row) {
            continue;
        }
        let name = cell(row, 0).text();
        let raw_type = cell(row, 1).text();
        let category_type = Nature::parse(&raw_type);

        let mut problems = Vec::new();
        if name.is_empty() {
            problems.push("Name is required".to_string());
        }
        if category_type.is_none() {
            problems.push(format!("Type must be RECEITA or DESPESA (got '{raw_type}')"));
        }

        let (status, message) = match category_type {
            Some(t) if problems.is_empty() => {
                if known.insert((name.to_lowercase(), t)) {
                    (RowStatus::New, None)
                } else {
                    (
                        RowStatus::Duplicate,
                        Some(format!("Category '{name}' already exists")),
                    )
                }
            }
            _ => (RowStatus::Invalid, Some(problems.join("; "))),
        };

        rows.push(CategoryCandidate {
            line: i + 1,
            name,
            category_type,
            raw_type,
            status,
            message,
        });
    }
    ImportBatch::new(rows)
}

impl ImportBatch<CategoryCandidate> {
    pub fn confirm(&self, state: &mut AppState, store: &dyn DataStore) -> Result<Vec<Category>> {
        let batch: Vec<NewCategory> = self
            .rows
            .iter()
            .filter(|r| r.status == RowStatus::New)
            .filter_map(|r| {
                r.category_type.map(|t| NewCategory {
                    name: r.name.clone(),
                    category_type: t,
                })
            })
            .collect();
        if batch.is_empty() {
            return Err(CuratelaError::NoNewRows);
        }
        let created = state.add_categories(store, &batch)?;
        log::info!(target: "import", "imported {} categories", created.len());
        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// Transaction import (four columns located by header)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnMap {
    pub date: usize,
    pub description: usize,
    pub category: usize,
    pub value: usize,
}

fn normalize_header(raw: &str) -> String {
    fold_diacritics(raw.trim()).to_lowercase()
}

/// Locate the four required columns by header name, ignoring case and
/// accents. Reports every missing column at once.
pub fn locate_columns(header: &[Cell]) -> Result<ColumnMap> {
    const WANTED: [(&str, &[&str]); 4] = [
        ("data", &["data", "date"]),
        ("descrição", &["descricao", "description", "historico"]),
        ("categoria", &["categoria", "category"]),
        ("valor", &["valor", "value"]),
    ];

    let names: Vec<String> = header.iter().map(|c| normalize_header(&c.text())).collect();
    let mut found = [None; 4];
    let mut missing = Vec::new();
    for (slot, (label, aliases)) in WANTED.iter().enumerate() {
        found[slot] = names.iter().position(|n| aliases.contains(&n.as_str()));
        if found[slot].is_none() {
            missing.push(label.to_string());
        }
    }
    match found {
        [Some(date), Some(description), Some(category), Some(value)] => Ok(ColumnMap {
            date,
            description,
            category,
            value,
        }),
        _ => Err(CuratelaError::MissingColumns(missing)),
    }
}

pub fn parse_date_cell(c: &Cell) -> std::result::Result<NaiveDate, String> {
    match c {
        Cell::Empty => Err("Date is required".into()),
        Cell::Number(n) => serial_to_date(*n).ok_or_else(|| format!("Invalid date serial: {n}")),
        Cell::Text(s) if s.trim().is_empty() => Err("Date is required".into()),
        Cell::Text(s) => parse_date_br(s.trim())
            .ok_or_else(|| format!("Invalid date '{}': expected DD/MM/YYYY", s.trim())),
    }
}

pub fn parse_value_cell(c: &Cell) -> std::result::Result<f64, String> {
    let value = match c {
        Cell::Empty => return Err("Value is required".into()),
        Cell::Number(n) => *n,
        Cell::Text(s) if s.trim().is_empty() => return Err("Value is required".into()),
        Cell::Text(s) => {
            parse_currency(s).ok_or_else(|| format!("Invalid value '{}'", s.trim()))?
        }
    };
    if !value.is_finite() || to_cents(value) == 0 {
        return Err("Value must be different from zero".into());
    }
    Ok(value.abs())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportTarget {
    pub account_id: i64,
    pub kind: TransactionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionCandidate {
    pub line: usize,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub category_name: String,
    pub value: Option<f64>,
    pub status: RowStatus,
    pub message: Option<String>,
    /// Present once the row validates.
    pub transaction: Option<NewTransaction>,
}

impl Candidate for TransactionCandidate {
    fn status(&self) -> RowStatus {
        self.status
    }
}

type DedupKey = (i64, NaiveDate, i64, String);

fn dedup_key(account_id: i64, date: NaiveDate, value: f64, description: &str) -> DedupKey {
    (account_id, date, to_cents(value.abs()), description.trim().to_lowercase())
}

fn resolve_expense_category(state: &AppState, name: &str) -> std::result::Result<i64, String> {
    let key = name.trim().to_lowercase();
    if key.is_empty() {
        return Err("Category is required".into());
    }
    if let Some(c) = state
        .categories_for(Nature::Despesa)
        .find(|c| c.name.to_lowercase() == key)
    {
        return Ok(c.id);
    }
    match state.category_by_name(name) {
        Some(c) => Err(format!(
            "Category '{}' is {}, expected DESPESA",
            c.name, c.category_type
        )),
        None => Err(format!("Category '{}' not found", name.trim())),
    }
}

/// Validate every data row of `grid` as an expense for `target`, yielding to
/// the runtime every [`YIELD_EVERY`] rows and reporting progress in percent.
pub async fn validate_transactions<P>(
    grid: &Grid,
    state: &AppState,
    target: ImportTarget,
    mut progress: P,
) -> Result<ImportBatch<TransactionCandidate>>
where
    P: FnMut(u8),
{
    let header = grid.first().map(Vec::as_slice).unwrap_or(&[]);
    let cols = locate_columns(header)?;

    let mut seen: HashSet<DedupKey> = state
        .transactions
        .iter()
        .filter(|t| t.account_id == target.account_id)
        .map(|t| dedup_key(t.account_id, t.date, t.value, &t.description))
        .collect();

    let total = grid.len().saturating_sub(1).max(1);
    let mut rows = Vec::new();
    for (i, row) in grid.iter().enumerate().skip(1) {
        if i % YIELD_EVERY == 0 {
            progress((i * 100 / total).min(99) as u8);
            tokio::task::yield_now().await;
        }
        if row_is_blank(row) {
            continue;
        }

        let description = cell(row, cols.description).text();
        let category_name = cell(row, cols.category).text();
        let date = parse_date_cell(cell(row, cols.date));
        let value = parse_value_cell(cell(row, cols.value));
        let category_id = resolve_expense_category(state, &category_name);

        let mut problems = Vec::new();
        if let Err(e) = &date {
            problems.push(e.clone());
        }
        if description.is_empty() {
            problems.push("Description is required".to_string());
        }
        if let Err(e) = &category_id {
            problems.push(e.clone());
        }
        if let Err(e) = &value {
            problems.push(e.clone());
        }

        let mut candidate = TransactionCandidate {
            line: i + 1,
            date: date.as_ref().ok().copied(),
            description: description.clone(),
            category_name,
            value: value.as_ref().ok().copied(),
            status: RowStatus::Invalid,
            message: None,
            transaction: None,
        };

        match (date, value, category_id) {
            (Ok(date), Ok(value), Ok(category_id)) if problems.is_empty() => {
                if seen.insert(dedup_key(target.account_id, date, value, &description)) {
                    candidate.status = RowStatus::New;
                } else {
                    candidate.status = RowStatus::Duplicate;
                    candidate.message = Some("Transaction already exists".into());
                }
                candidate.transaction = Some(NewTransaction {
                    description,
                    nature: Nature::Despesa,
                    account_id: target.account_id,
                    category_id,
                    date,
                    value,
                    kind: target.kind,
                });
            }
            _ => candidate.message = Some(problems.join("; ")),
        }
        rows.push(candidate);
    }
    progress(100);

    let batch = ImportBatch::new(rows);
    log::info!(
        target: "import",
        "validated {} rows: {} new, {} duplicate, {} invalid",
        batch.rows.len(),
        batch.count(RowStatus::New),
        batch.count(RowStatus::Duplicate),
        batch.count(RowStatus::Invalid)
    );
    Ok(batch)
}

impl ImportBatch<TransactionCandidate> {
    pub fn confirm(&self, state: &mut AppState, store: &dyn DataStore) -> Result<Vec<Transaction>> {
        let batch: Vec<NewTransaction> = self
            .rows
            .iter()
            .filter(|r| r.status == RowStatus::New)
            .filter_map(|r| r.transaction.clone())
            .collect();
        if batch.is_empty() {
            return Err(CuratelaError::NoNewRows);
        }
        let created = state.add_transactions(store, &batch)?;
        log::info!(target: "import", "imported {} transactions", created.len());
        Ok(created)
    }
}
