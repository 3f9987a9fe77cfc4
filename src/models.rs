use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Income or expense. Doubles as the category type and the transaction nature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Nature {
    Receita,
    Despesa,
}

impl Nature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receita => "RECEITA",
            Self::Despesa => "DESPESA",
        }
    }

    /// Case-insensitive, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "RECEITA" => Some(Self::Receita),
            "DESPESA" => Some(Self::Despesa),
            _ => None,
        }
    }
}

impl std::fmt::Display for Nature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    ContaCorrente,
    ContaPoupanca,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContaCorrente => "CONTA_CORRENTE",
            Self::ContaPoupanca => "CONTA_POUPANCA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "CONTA_CORRENTE" | "CORRENTE" => Some(Self::ContaCorrente),
            "CONTA_POUPANCA" | "POUPANCA" => Some(Self::ContaPoupanca),
            _ => None,
        }
    }
}

/// Which ledger a transaction belongs to. Only checking-account entries move
/// a bank balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    CheckingAccount,
    CreditCard,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckingAccount => "checking_account",
            Self::CreditCard => "credit_card",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "checking_account" | "checking" => Some(Self::CheckingAccount),
            "credit_card" | "card" => Some(Self::CreditCard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub category_type: Nature,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankAccount {
    pub id: i64,
    pub name: String,
    pub account_type: AccountType,
    pub initial_balance: f64,
    pub opened_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub transaction_id: i64,
    pub name: String,
    pub mime_kind: String,
    pub storage_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub description: String,
    pub nature: Nature,
    pub account_id: i64,
    pub category_id: i64,
    pub date: NaiveDate,
    /// Magnitude only; the sign comes from `nature`.
    pub value: f64,
    pub kind: TransactionKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub storage_path: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityLog {
    pub id: i64,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<i64>,
    pub detail: String,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Insert payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub account_type: AccountType,
    pub initial_balance: f64,
    pub opened_on: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub category_type: Nature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub description: String,
    pub nature: Nature,
    pub account_id: i64,
    pub category_id: i64,
    pub date: NaiveDate,
    pub value: f64,
    pub kind: TransactionKind,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub name: String,
    pub mime_kind: String,
    pub storage_path: String,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub storage_path: String,
}
