use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    account_type TEXT NOT NULL,
    initial_balance REAL NOT NULL DEFAULT 0,
    opened_on TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category_type TEXT NOT NULL CHECK (category_type IN ('RECEITA', 'DESPESA')),
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    nature TEXT NOT NULL CHECK (nature IN ('RECEITA', 'DESPESA')),
    account_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    value REAL NOT NULL CHECK (value >= 0),
    kind TEXT NOT NULL DEFAULT 'checking_account',
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id),
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY,
    transaction_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    mime_kind TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    FOREIGN KEY (transaction_id) REFERENCES transactions(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY,
    action TEXT NOT NULL,
    entity TEXT NOT NULL,
    entity_id INTEGER,
    detail TEXT NOT NULL DEFAULT '',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
";

// (name, category_type)
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    // Receitas
    ("Salário", "RECEITA"),
    ("Aposentadoria", "RECEITA"),
    ("Aluguel Recebido", "RECEITA"),
    ("Rendimentos", "RECEITA"),
    ("Outras Receitas", "RECEITA"),
    // Despesas
    ("Alimentação", "DESPESA"),
    ("Moradia", "DESPESA"),
    ("Saúde", "DESPESA"),
    ("Farmácia", "DESPESA"),
    ("Transporte", "DESPESA"),
    ("Educação", "DESPESA"),
    ("Lazer", "DESPESA"),
    ("Contas de Consumo", "DESPESA"),
    ("Impostos e Taxas", "DESPESA"),
    ("Tarifas Bancárias", "DESPESA"),
    ("Cuidadores", "DESPESA"),
    ("Outras Despesas", "DESPESA"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, category_type) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (name, category_type) VALUES (?1, ?2)",
                rusqlite::params![name, category_type],
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &[
            "accounts",
            "categories",
            "transactions",
            "attachments",
            "documents",
            "activity_logs",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |r| r.get(0)).unwrap();
        assert_eq!(count, DEFAULT_CATEGORIES.len() as i64);
    }

    #[test]
    fn test_default_categories_cover_both_types() {
        let (_dir, conn) = test_db();
        let income: i64 = conn
            .query_row("SELECT count(*) FROM categories WHERE category_type = 'RECEITA'", [], |r| r.get(0))
            .unwrap();
        let expense: i64 = conn
            .query_row("SELECT count(*) FROM categories WHERE category_type = 'DESPESA'", [], |r| r.get(0))
            .unwrap();
        assert!(income >= 5, "expected >= 5 income categories, got {income}");
        assert!(expense >= 10, "expected >= 10 expense categories, got {expense}");
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let (_dir, conn) = test_db();
        let result = conn.execute(
            "INSERT INTO transactions (description, nature, account_id, category_id, date, value) \
             VALUES ('x', 'DESPESA', 999, 999, '2024-01-01', 1.0)",
            [],
        );
        assert!(result.is_err());
    }
}
