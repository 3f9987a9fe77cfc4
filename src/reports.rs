use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Utc};

use crate::fmt::{from_cents, to_cents};
use crate::models::*;
use crate::state::AppState;

pub const UNRESOLVED_CATEGORY: &str = "Outros";

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// Signed sum of checking-account transactions for one account. Credit-card
/// entries never touch a bank balance; unknown ids yield 0.
pub fn account_balance(account_id: i64, transactions: &[Transaction]) -> f64 {
    let cents: i64 = transactions
        .iter()
        .filter(|t| t.account_id == account_id && t.kind == TransactionKind::CheckingAccount)
        .map(|t| match t.nature {
            Nature::Receita => to_cents(t.value),
            Nature::Despesa => -to_cents(t.value),
        })
        .sum();
    from_cents(cents)
}

pub struct AccountBalance {
    pub id: i64,
    pub name: String,
    pub account_type: AccountType,
    pub balance: f64,
}

pub fn account_balances(state: &AppState) -> Vec<AccountBalance> {
    state
        .accounts
        .iter()
        .map(|a| AccountBalance {
            id: a.id,
            name: a.name.clone(),
            account_type: a.account_type,
            balance: account_balance(a.id, &state.transactions),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Monthly summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthBounds {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl MonthBounds {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    pub fn label(&self) -> String {
        self.first.format("%m/%Y").to_string()
    }
}

/// First and last day (inclusive) of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> MonthBounds {
    let first = day.with_day(1).unwrap_or(day);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(day);
    MonthBounds { first, last }
}

/// Month bounds for today, evaluated in UTC.
pub fn current_month_bounds() -> MonthBounds {
    month_bounds(Utc::now().date_naive())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlySummary {
    pub income: f64,
    pub expense: f64,
    pub net: f64,
}

pub fn monthly_summary(transactions: &[Transaction], bounds: MonthBounds) -> MonthlySummary {
    let mut income = 0i64;
    let mut expense = 0i64;
    for t in transactions.iter().filter(|t| bounds.contains(t.date)) {
        match t.nature {
            Nature::Receita => income += to_cents(t.value),
            Nature::Despesa => expense += to_cents(t.value),
        }
    }
    MonthlySummary {
        income: from_cents(income),
        expense: from_cents(expense),
        net: from_cents(income - expense),
    }
}

// ---------------------------------------------------------------------------
// Expenses by category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTotal {
    pub name: String,
    pub total: f64,
    pub count: usize,
    pub pct: f64,
}

/// All-time expense totals per category name, largest first. Transactions
/// whose category cannot be resolved land in "Outros".
pub fn expenses_by_category(transactions: &[Transaction], categories: &[Category]) -> Vec<CategoryTotal> {
    let names: HashMap<i64, &str> = categories.iter().map(|c| (c.id, c.name.as_str())).collect();
    let mut buckets: HashMap<String, (i64, usize)> = HashMap::new();
    for t in transactions.iter().filter(|t| t.nature == Nature::Despesa) {
        let name = names
            .get(&t.category_id)
            .copied()
            .unwrap_or(UNRESOLVED_CATEGORY);
        let entry = buckets.entry(name.to_string()).or_default();
        entry.0 += to_cents(t.value);
        entry.1 += 1;
    }

    let grand: i64 = buckets.values().map(|(c, _)| c).sum();
    let mut totals: Vec<CategoryTotal> = buckets
        .into_iter()
        .map(|(name, (cents, count))| CategoryTotal {
            name,
            total: from_cents(cents),
            count,
            pct: if grand != 0 { cents as f64 / grand as f64 * 100.0 } else { 0.0 },
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    totals
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

pub struct Dashboard {
    pub balances: Vec<AccountBalance>,
    pub total_balance: f64,
    pub bounds: MonthBounds,
    pub month: MonthlySummary,
    pub expenses_by_category: Vec<CategoryTotal>,
}

pub fn dashboard(state: &AppState, bounds: MonthBounds) -> Dashboard {
    let balances = account_balances(state);
    let total_balance = from_cents(balances.iter().map(|b| to_cents(b.balance)).sum());
    Dashboard {
        balances,
        total_balance,
        bounds,
        month: monthly_summary(&state.transactions, bounds),
        expenses_by_category: expenses_by_category(&state.transactions, &state.categories),
    }
}

// ---------------------------------------------------------------------------
// Register (PDF export)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RegisterFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub account_id: Option<i64>,
    pub kind: Option<TransactionKind>,
}

pub struct RegisterRow {
    pub date: NaiveDate,
    pub description: String,
    pub account_name: String,
    pub category_name: String,
    pub nature: Nature,
    pub value: f64,
}

pub struct RegisterReport {
    pub rows: Vec<RegisterRow>,
    pub total_income: f64,
    pub total_expense: f64,
    pub net: f64,
}

pub fn register(state: &AppState, filter: &RegisterFilter) -> RegisterReport {
    let mut txns: Vec<&Transaction> = state
        .transactions
        .iter()
        .filter(|t| filter.from.map_or(true, |f| t.date >= f))
        .filter(|t| filter.to.map_or(true, |to| t.date <= to))
        .filter(|t| filter.account_id.map_or(true, |a| t.account_id == a))
        .filter(|t| filter.kind.map_or(true, |k| t.kind == k))
        .collect();
    txns.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

    let mut income = 0i64;
    let mut expense = 0i64;
    let rows = txns
        .into_iter()
        .map(|t| {
            match t.nature {
                Nature::Receita => income += to_cents(t.value),
                Nature::Despesa => expense += to_cents(t.value),
            }
            RegisterRow {
                date: t.date,
                description: t.description.clone(),
                account_name: state
                    .account(t.account_id)
                    .map(|a| a.name.clone())
                    .unwrap_or_default(),
                category_name: state
                    .category(t.category_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| UNRESOLVED_CATEGORY.to_string()),
                nature: t.nature,
                value: t.value,
            }
        })
        .collect();

    RegisterReport {
        rows,
        total_income: from_cents(income),
        total_expense: from_cents(expense),
        net: from_cents(income - expense),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn txn(id: i64, account_id: i64, nature: Nature, value: f64, date: NaiveDate, kind: TransactionKind) -> Transaction {
        Transaction {
            id,
            description: format!("t{id}"),
            nature,
            account_id,
            category_id: 1,
            date,
            value,
            kind,
            attachments: Vec::new(),
        }
    }

    fn checking(id: i64, account_id: i64, nature: Nature, value: f64) -> Transaction {
        txn(id, account_id, nature, value, ymd(2024, 3, 10), TransactionKind::CheckingAccount)
    }

    #[test]
    fn test_balance_of_empty_account_is_zero() {
        assert_eq!(account_balance(1, &[]), 0.0);
        let others = vec![checking(1, 2, Nature::Receita, 100.0)];
        assert_eq!(account_balance(1, &others), 0.0);
    }

    #[test]
    fn test_balance_is_income_minus_expense() {
        let txns = vec![
            checking(1, 1, Nature::Receita, 1000.0),
            checking(2, 1, Nature::Despesa, 250.75),
            checking(3, 1, Nature::Despesa, 49.25),
            checking(4, 2, Nature::Despesa, 999.0),
        ];
        assert_eq!(account_balance(1, &txns), 700.0);
        let mut reversed = txns.clone();
        reversed.reverse();
        assert_eq!(account_balance(1, &reversed), 700.0);
    }

    #[test]
    fn test_credit_card_does_not_affect_balance() {
        let txns = vec![
            checking(1, 1, Nature::Receita, 100.0),
            txn(2, 1, Nature::Despesa, 80.0, ymd(2024, 3, 1), TransactionKind::CreditCard),
        ];
        assert_eq!(account_balance(1, &txns), 100.0);
    }

    #[test]
    fn test_balance_avoids_float_drift() {
        let txns: Vec<Transaction> = (0..10).map(|i| checking(i, 1, Nature::Receita, 0.1)).collect();
        assert_eq!(account_balance(1, &txns), 1.0);
    }

    #[test]
    fn test_month_bounds() {
        let b = month_bounds(ymd(2024, 2, 14));
        assert_eq!(b.first, ymd(2024, 2, 1));
        assert_eq!(b.last, ymd(2024, 2, 29));
        let dec = month_bounds(ymd(2023, 12, 31));
        assert_eq!(dec.first, ymd(2023, 12, 1));
        assert_eq!(dec.last, ymd(2023, 12, 31));
    }

    #[test]
    fn test_monthly_summary_includes_edges() {
        let bounds = month_bounds(ymd(2024, 3, 15));
        let txns = vec![
            txn(1, 1, Nature::Receita, 500.0, ymd(2024, 3, 1), TransactionKind::CheckingAccount),
            txn(2, 1, Nature::Despesa, 120.0, ymd(2024, 3, 31), TransactionKind::CreditCard),
            txn(3, 1, Nature::Despesa, 999.0, ymd(2024, 2, 29), TransactionKind::CheckingAccount),
            txn(4, 1, Nature::Receita, 999.0, ymd(2024, 4, 1), TransactionKind::CheckingAccount),
        ];
        let s = monthly_summary(&txns, bounds);
        assert_eq!(s.income, 500.0);
        assert_eq!(s.expense, 120.0);
        assert_eq!(s.net, 380.0);
    }

    #[test]
    fn test_expenses_by_category_sorted_with_fallback() {
        let categories = vec![
            Category { id: 1, name: "Saúde".into(), category_type: Nature::Despesa },
            Category { id: 2, name: "Lazer".into(), category_type: Nature::Despesa },
        ];
        let mut t1 = checking(1, 1, Nature::Despesa, 50.0);
        t1.category_id = 2;
        let mut t2 = checking(2, 1, Nature::Despesa, 300.0);
        t2.category_id = 1;
        let mut t3 = checking(3, 1, Nature::Despesa, 75.0);
        t3.category_id = 77;
        let mut t4 = checking(4, 1, Nature::Receita, 1000.0);
        t4.category_id = 1;

        let totals = expenses_by_category(&[t1, t2, t3, t4], &categories);
        let names: Vec<&str> = totals.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Saúde", UNRESOLVED_CATEGORY, "Lazer"]);
        assert_eq!(totals[0].total, 300.0);
        assert_eq!(totals[0].count, 1);
        let pct_sum: f64 = totals.iter().map(|t| t.pct).sum();
        assert!((pct_sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_register_filters_and_totals() {
        let state = AppState {
            accounts: vec![BankAccount {
                id: 1,
                name: "Conta".into(),
                account_type: AccountType::ContaCorrente,
                initial_balance: 0.0,
                opened_on: ymd(2024, 1, 1),
            }],
            categories: vec![Category { id: 1, name: "Geral".into(), category_type: Nature::Despesa }],
            transactions: vec![
                txn(2, 1, Nature::Despesa, 30.0, ymd(2024, 3, 5), TransactionKind::CheckingAccount),
                txn(1, 1, Nature::Receita, 100.0, ymd(2024, 3, 1), TransactionKind::CheckingAccount),
                txn(3, 1, Nature::Despesa, 10.0, ymd(2024, 4, 1), TransactionKind::CheckingAccount),
            ],
        };
        let filter = RegisterFilter {
            from: Some(ymd(2024, 3, 1)),
            to: Some(ymd(2024, 3, 31)),
            ..RegisterFilter::default()
        };
        let report = register(&state, &filter);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].date, ymd(2024, 3, 1));
        assert_eq!(report.rows[0].account_name, "Conta");
        assert_eq!(report.total_income, 100.0);
        assert_eq!(report.total_expense, 30.0);
        assert_eq!(report.net, 70.0);
    }
}
