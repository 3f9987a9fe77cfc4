pub mod accounts;
pub mod ask;
pub mod categories;
pub mod dashboard;
pub mod documents;
#[cfg(feature = "pdf")]
pub mod export;
pub mod import;
pub mod init;
pub mod logs;
pub mod scan;
pub mod status;
pub mod transactions;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::error::{CuratelaError, Result};
use crate::fmt::{parse_currency, parse_date_br, parse_date_iso};
use crate::importer::RowStatus;
use crate::models::{AccountType, Nature, TransactionKind};
use crate::settings::{load_settings, Settings};
use crate::state::AppState;
use crate::storage::LocalBucket;
use crate::store::SqliteStore;

/// Everything a command needs: settings, the open store, the bucket and the
/// loaded application state.
pub struct Session {
    pub settings: Settings,
    pub store: SqliteStore,
    pub bucket: LocalBucket,
    pub state: AppState,
}

impl Session {
    pub fn open() -> Result<Self> {
        let settings = load_settings();
        let db_path = settings.db_path();
        if !db_path.exists() {
            return Err(CuratelaError::Other(format!(
                "Database not found at {}. Run `curatela init` first.",
                db_path.display()
            )));
        }
        let store = SqliteStore::open(&db_path)?;
        let state = AppState::load(&store)?;
        let bucket = LocalBucket::new(settings.bucket_dir());
        Ok(Self {
            settings,
            store,
            bucket,
            state,
        })
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

/// `DD/MM/YYYY` or `YYYY-MM-DD`.
pub(crate) fn parse_date_arg(raw: &str) -> Result<NaiveDate> {
    parse_date_br(raw.trim())
        .or_else(|| parse_date_iso(raw.trim()))
        .ok_or_else(|| CuratelaError::Validation(format!("Invalid date '{raw}': use DD/MM/YYYY")))
}

pub(crate) fn parse_date_opt(raw: &Option<String>) -> Result<Option<NaiveDate>> {
    raw.as_deref().map(parse_date_arg).transpose()
}

/// Plain (`1234.56`) or PT-BR (`1.234,56`) amounts.
pub(crate) fn parse_value_arg(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .or_else(|| parse_currency(raw))
        .ok_or_else(|| CuratelaError::Validation(format!("Invalid value '{raw}'")))
}

pub(crate) fn parse_nature(raw: &str) -> Result<Nature> {
    Nature::parse(raw)
        .ok_or_else(|| CuratelaError::Validation(format!("Type must be RECEITA or DESPESA (got '{raw}')")))
}

pub(crate) fn parse_account_type(raw: &str) -> Result<AccountType> {
    AccountType::parse(raw).ok_or_else(|| {
        CuratelaError::Validation(format!(
            "Account type must be CONTA_CORRENTE or CONTA_POUPANCA (got '{raw}')"
        ))
    })
}

pub(crate) fn parse_kind(raw: &str) -> Result<TransactionKind> {
    TransactionKind::parse(raw).ok_or_else(|| {
        CuratelaError::Validation(format!(
            "Transaction type must be checking_account or credit_card (got '{raw}')"
        ))
    })
}

/// 1-based row numbers as printed in review tables, turned into 0-based
/// indices.
pub(crate) fn parse_exclude(rows: &[usize]) -> Vec<usize> {
    rows.iter().filter(|&&r| r > 0).map(|r| r - 1).collect()
}

/// Status column of a review table; rows left out with `--exclude` say so.
pub(crate) fn row_label(status: RowStatus, excluded: bool) -> String {
    if excluded {
        return "excluded".dimmed().to_string();
    }
    match status {
        RowStatus::New => status.as_str().green().to_string(),
        RowStatus::Duplicate => status.as_str().yellow().to_string(),
        RowStatus::Invalid => status.as_str().red().to_string(),
    }
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ---------------------------------------------------------------------------
// Command tree
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "curatela", about = "Family finances under guardianship: accounts, expenses, receipts and reports.")]
pub struct Cli {
    /// Echo log records to stderr and print the log buffer summary on exit.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for Curatela data (default: ~/Documents/curatela)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Base URL of the AI service
        #[arg(long = "ai-url")]
        ai_url: Option<String>,
        /// API key for the AI service
        #[arg(long = "ai-key")]
        ai_key: Option<String>,
    },
    /// Show the data directory and record counts.
    Status,
    /// Manage bank accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Manage categories.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Manage transactions.
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Import expenses from a spreadsheet (Data, Descrição, Categoria, Valor).
    Import {
        /// CSV or XLSX file
        file: String,
        /// Account the expenses belong to
        #[arg(long)]
        account: String,
        /// checking_account or credit_card
        #[arg(long, default_value = "checking_account")]
        kind: String,
        /// Row numbers to leave out (as shown in the review table)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<usize>,
        /// Save the rows instead of only reviewing them
        #[arg(long)]
        yes: bool,
    },
    /// Extract transactions or receipts with the AI service.
    Scan {
        #[command(subcommand)]
        command: ScanCommands,
    },
    /// Store and list documents.
    Documents {
        #[command(subcommand)]
        command: DocumentsCommands,
    },
    /// Balances, this month's totals and expenses by category.
    Dashboard,
    /// Export the transaction register to PDF.
    #[cfg(feature = "pdf")]
    Export {
        /// Output file path (default: <data_dir>/exports/extrato-YYYY-MM-DD.pdf)
        #[arg(long)]
        output: Option<String>,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Only this account
        #[arg(long)]
        account: Option<String>,
        /// checking_account or credit_card
        #[arg(long)]
        kind: Option<String>,
    },
    /// Ask a question about the finances.
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Show the activity log.
    Logs {
        #[arg(long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a bank account.
    Add {
        name: String,
        /// CONTA_CORRENTE or CONTA_POUPANCA
        #[arg(long = "type", default_value = "CONTA_CORRENTE")]
        account_type: String,
        /// Opening balance, recorded as a "Saldo inicial" transaction
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        initial: String,
        /// Opening date (default: today)
        #[arg(long)]
        opened: Option<String>,
    },
    /// List accounts with their balances.
    List,
    /// Update an account.
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        account_type: Option<String>,
        #[arg(long)]
        opened: Option<String>,
    },
    /// Delete an account with no transactions other than its opening balance.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Add a category.
    Add {
        name: String,
        /// RECEITA or DESPESA
        #[arg(long = "type")]
        category_type: String,
    },
    /// List categories.
    List {
        /// Only RECEITA or DESPESA
        #[arg(long = "type")]
        category_type: Option<String>,
    },
    /// Rename or retype a category.
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        category_type: Option<String>,
    },
    /// Delete a category no transaction uses.
    Delete { id: i64 },
    /// Import categories from a two-column file (name, type).
    Import {
        file: String,
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<usize>,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// Record a transaction.
    Add {
        #[arg(long)]
        description: String,
        #[arg(long)]
        value: String,
        /// RECEITA or DESPESA
        #[arg(long, default_value = "DESPESA")]
        nature: String,
        #[arg(long)]
        account: String,
        #[arg(long)]
        category: String,
        /// Date (default: today)
        #[arg(long)]
        date: Option<String>,
        /// checking_account or credit_card
        #[arg(long, default_value = "checking_account")]
        kind: String,
        /// Image or PDF to keep as evidence
        #[arg(long)]
        attach: Option<String>,
    },
    /// List transactions, newest first.
    List {
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long = "from")]
        from_date: Option<String>,
        #[arg(long = "to")]
        to_date: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Update a transaction.
    Update {
        id: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        value: Option<String>,
        #[arg(long)]
        nature: Option<String>,
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        kind: Option<String>,
    },
    /// Delete a transaction and its attachments.
    Delete { id: i64 },
    /// Attach an image or PDF to a transaction.
    Attach { id: i64, file: String },
}

#[derive(Subcommand)]
pub enum ScanCommands {
    /// Extract transactions from a statement or invoice (PDF or image).
    Document {
        file: String,
        #[arg(long)]
        account: String,
        #[arg(long, default_value = "checking_account")]
        kind: String,
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<usize>,
        #[arg(long)]
        yes: bool,
    },
    /// Read a receipt photo and record it as an expense.
    Receipt {
        file: String,
        #[arg(long)]
        account: String,
        /// Expense category (default: Outras Despesas)
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "checking_account")]
        kind: String,
        /// Override the extracted description
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum DocumentsCommands {
    /// Store a document.
    Add {
        file: String,
        #[arg(long)]
        title: String,
    },
    /// List stored documents.
    List,
    /// Delete a document.
    Delete { id: i64 },
}

pub async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Init { data_dir, ai_url, ai_key } => init::run(data_dir, ai_url, ai_key),
        Commands::Status => status::run(),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                account_type,
                initial,
                opened,
            } => accounts::add(&name, &account_type, &initial, opened.as_deref()),
            AccountsCommands::List => accounts::list(),
            AccountsCommands::Update {
                id,
                name,
                account_type,
                opened,
            } => accounts::update(id, name, account_type, opened),
            AccountsCommands::Delete { id } => accounts::delete(id),
        },
        Commands::Categories { command } => match command {
            CategoriesCommands::Add { name, category_type } => categories::add(&name, &category_type),
            CategoriesCommands::List { category_type } => categories::list(category_type.as_deref()),
            CategoriesCommands::Update {
                id,
                name,
                category_type,
            } => categories::update(id, name, category_type),
            CategoriesCommands::Delete { id } => categories::delete(id),
            CategoriesCommands::Import { file, exclude, yes } => categories::import(&file, &exclude, yes),
        },
        Commands::Transactions { command } => match command {
            TransactionsCommands::Add {
                description,
                value,
                nature,
                account,
                category,
                date,
                kind,
                attach,
            } => {
                let args = transactions::AddArgs {
                    description,
                    value,
                    nature,
                    account,
                    category,
                    date,
                    kind,
                    attach,
                };
                transactions::add(args).await
            }
            TransactionsCommands::List {
                account,
                kind,
                from_date,
                to_date,
                limit,
            } => transactions::list(account, kind, from_date, to_date, limit),
            TransactionsCommands::Update {
                id,
                description,
                value,
                nature,
                account,
                category,
                date,
                kind,
            } => {
                let args = transactions::UpdateArgs {
                    description,
                    value,
                    nature,
                    account,
                    category,
                    date,
                    kind,
                };
                transactions::update(id, args)
            }
            TransactionsCommands::Delete { id } => transactions::delete(id).await,
            TransactionsCommands::Attach { id, file } => transactions::attach(id, &file).await,
        },
        Commands::Import {
            file,
            account,
            kind,
            exclude,
            yes,
        } => import::run(&file, &account, &kind, &exclude, yes).await,
        Commands::Scan { command } => match command {
            ScanCommands::Document {
                file,
                account,
                kind,
                exclude,
                yes,
            } => scan::document(&file, &account, &kind, &exclude, yes).await,
            ScanCommands::Receipt {
                file,
                account,
                category,
                kind,
                description,
                yes,
            } => scan::receipt(&file, &account, category.as_deref(), &kind, description, yes).await,
        },
        Commands::Documents { command } => match command {
            DocumentsCommands::Add { file, title } => documents::add(&file, &title).await,
            DocumentsCommands::List => documents::list(),
            DocumentsCommands::Delete { id } => documents::delete(id).await,
        },
        Commands::Dashboard => dashboard::run(),
        #[cfg(feature = "pdf")]
        Commands::Export {
            output,
            from_date,
            to_date,
            account,
            kind,
        } => export::run(output, from_date, to_date, account, kind),
        Commands::Ask { question } => ask::run(&question.join(" ")).await,
        Commands::Logs { limit } => logs::run(limit),
    }
}
