use std::collections::HashMap;
use std::path::Path;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::{get_connection, init_db};
use crate::error::{map_delete_error, CuratelaError, Result};
use crate::models::*;

/// CRUD surface of the backing store. Every mutation the application makes
/// goes through here so in-memory state and the store cannot drift apart.
pub trait DataStore {
    fn list_accounts(&self) -> Result<Vec<BankAccount>>;
    fn insert_account(&self, new: &NewAccount) -> Result<BankAccount>;
    fn update_account(&self, account: &BankAccount) -> Result<()>;
    fn delete_account(&self, id: i64) -> Result<()>;

    fn list_categories(&self) -> Result<Vec<Category>>;
    /// All-or-nothing batch insert.
    fn insert_categories(&self, batch: &[NewCategory]) -> Result<Vec<Category>>;
    fn update_category(&self, category: &Category) -> Result<()>;
    fn delete_category(&self, id: i64) -> Result<()>;

    fn list_transactions(&self) -> Result<Vec<Transaction>>;
    /// All-or-nothing batch insert.
    fn insert_transactions(&self, batch: &[NewTransaction]) -> Result<Vec<Transaction>>;
    fn update_transaction(&self, txn: &Transaction) -> Result<()>;
    /// Attachment rows go with the transaction; stored objects are the
    /// caller's to remove.
    fn delete_transaction(&self, id: i64) -> Result<()>;
    fn insert_attachment(&self, transaction_id: i64, new: &NewAttachment) -> Result<Attachment>;

    fn list_documents(&self) -> Result<Vec<Document>>;
    fn insert_document(&self, new: &NewDocument) -> Result<Document>;
    fn delete_document(&self, id: i64) -> Result<()>;

    fn list_activity(&self, limit: usize) -> Result<Vec<ActivityLog>>;

    fn insert_category(&self, new: &NewCategory) -> Result<Category> {
        self.insert_categories(std::slice::from_ref(new))?
            .pop()
            .ok_or_else(|| CuratelaError::Other("insert returned no row".into()))
    }

    fn insert_transaction(&self, new: &NewTransaction) -> Result<Transaction> {
        self.insert_transactions(std::slice::from_ref(new))?
            .pop()
            .ok_or_else(|| CuratelaError::Other("insert returned no row".into()))
    }
}

// ---------------------------------------------------------------------------
// Column conversions
// ---------------------------------------------------------------------------

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let raw = value.as_str()?;
                <$ty>::parse(raw).ok_or_else(|| {
                    FromSqlError::Other(format!("unexpected {}: {raw}", stringify!($ty)).into())
                })
            }
        }
    };
}

text_enum_sql!(Nature);
text_enum_sql!(AccountType);
text_enum_sql!(TransactionKind);

fn account_from_row(row: &Row) -> rusqlite::Result<BankAccount> {
    Ok(BankAccount {
        id: row.get(0)?,
        name: row.get(1)?,
        account_type: row.get(2)?,
        initial_balance: row.get(3)?,
        opened_on: row.get(4)?,
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        category_type: row.get(2)?,
    })
}

fn transaction_from_row(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        description: row.get(1)?,
        nature: row.get(2)?,
        account_id: row.get(3)?,
        category_id: row.get(4)?,
        date: row.get(5)?,
        value: row.get(6)?,
        kind: row.get(7)?,
        attachments: Vec::new(),
    })
}

fn attachment_from_row(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        name: row.get(2)?,
        mime_kind: row.get(3)?,
        storage_path: row.get(4)?,
    })
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (and initialize if needed) the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn record(&self, action: &str, entity: &str, entity_id: Option<i64>, detail: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO activity_logs (action, entity, entity_id, detail) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![action, entity, entity_id, detail],
        )?;
        log::debug!(target: "store", "{action} {entity} {entity_id:?} {detail}");
        Ok(())
    }

    fn attachments_by_transaction(&self) -> Result<HashMap<i64, Vec<Attachment>>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, transaction_id, name, mime_kind, storage_path FROM attachments ORDER BY id",
        )?;
        let mut grouped: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for att in stmt.query_map([], attachment_from_row)? {
            let att = att?;
            grouped.entry(att.transaction_id).or_default().push(att);
        }
        Ok(grouped)
    }

    fn get_account(&self, id: i64) -> Result<BankAccount> {
        self.conn
            .query_row(
                "SELECT id, name, account_type, initial_balance, opened_on FROM accounts WHERE id = ?1",
                [id],
                account_from_row,
            )
            .optional()?
            .ok_or_else(|| CuratelaError::NotFound(format!("account {id}")))
    }
}

impl DataStore for SqliteStore {
    fn list_accounts(&self) -> Result<Vec<BankAccount>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, account_type, initial_balance, opened_on FROM accounts ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_account(&self, new: &NewAccount) -> Result<BankAccount> {
        self.conn.execute(
            "INSERT INTO accounts (name, account_type, initial_balance, opened_on) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![new.name, new.account_type, new.initial_balance, new.opened_on],
        )?;
        let id = self.conn.last_insert_rowid();
        self.record("create", "account", Some(id), &new.name)?;
        self.get_account(id)
    }

    fn update_account(&self, account: &BankAccount) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE accounts SET name = ?1, account_type = ?2, initial_balance = ?3, opened_on = ?4 WHERE id = ?5",
            rusqlite::params![
                account.name,
                account.account_type,
                account.initial_balance,
                account.opened_on,
                account.id
            ],
        )?;
        if updated == 0 {
            return Err(CuratelaError::NotFound(format!("account {}", account.id)));
        }
        self.record("update", "account", Some(account.id), &account.name)
    }

    fn delete_account(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM accounts WHERE id = ?1", [id])
            .map_err(|e| map_delete_error(e, &format!("account {id}")))?;
        if deleted == 0 {
            return Err(CuratelaError::NotFound(format!("account {id}")));
        }
        self.record("delete", "account", Some(id), "")
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category_type FROM categories \
             ORDER BY CASE category_type WHEN 'RECEITA' THEN 0 ELSE 1 END, name ASC",
        )?;
        let rows = stmt
            .query_map([], category_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_categories(&self, batch: &[NewCategory]) -> Result<Vec<Category>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(batch.len());
        for new in batch {
            tx.execute(
                "INSERT INTO categories (name, category_type) VALUES (?1, ?2)",
                rusqlite::params![new.name, new.category_type],
            )?;
            inserted.push(Category {
                id: tx.last_insert_rowid(),
                name: new.name.clone(),
                category_type: new.category_type,
            });
        }
        tx.commit()?;
        self.record("create", "category", None, &format!("{} row(s)", inserted.len()))?;
        Ok(inserted)
    }

    fn update_category(&self, category: &Category) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE categories SET name = ?1, category_type = ?2 WHERE id = ?3",
            rusqlite::params![category.name, category.category_type, category.id],
        )?;
        if updated == 0 {
            return Err(CuratelaError::NotFound(format!("category {}", category.id)));
        }
        self.record("update", "category", Some(category.id), &category.name)
    }

    fn delete_category(&self, id: i64) -> Result<()> {
        let name: Option<String> = self
            .conn
            .query_row("SELECT name FROM categories WHERE id = ?1", [id], |r| r.get(0))
            .optional()?;
        let Some(name) = name else {
            return Err(CuratelaError::NotFound(format!("category {id}")));
        };
        self.conn
            .execute("DELETE FROM categories WHERE id = ?1", [id])
            .map_err(|e| map_delete_error(e, &format!("category '{name}'")))?;
        self.record("delete", "category", Some(id), &name)
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let mut attachments = self.attachments_by_transaction()?;
        let mut stmt = self.conn.prepare(
            "SELECT id, description, nature, account_id, category_id, date, value, kind \
             FROM transactions ORDER BY date, id",
        )?;
        let mut rows = stmt
            .query_map([], transaction_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for txn in &mut rows {
            if let Some(atts) = attachments.remove(&txn.id) {
                txn.attachments = atts;
            }
        }
        Ok(rows)
    }

    fn insert_transactions(&self, batch: &[NewTransaction]) -> Result<Vec<Transaction>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(batch.len());
        for new in batch {
            tx.execute(
                "INSERT INTO transactions (description, nature, account_id, category_id, date, value, kind) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    new.description,
                    new.nature,
                    new.account_id,
                    new.category_id,
                    new.date,
                    new.value.abs(),
                    new.kind
                ],
            )?;
            inserted.push(Transaction {
                id: tx.last_insert_rowid(),
                description: new.description.clone(),
                nature: new.nature,
                account_id: new.account_id,
                category_id: new.category_id,
                date: new.date,
                value: new.value.abs(),
                kind: new.kind,
                attachments: Vec::new(),
            });
        }
        tx.commit()?;
        self.record("create", "transaction", None, &format!("{} row(s)", inserted.len()))?;
        Ok(inserted)
    }

    fn update_transaction(&self, txn: &Transaction) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE transactions SET description = ?1, nature = ?2, account_id = ?3, category_id = ?4, \
             date = ?5, value = ?6, kind = ?7 WHERE id = ?8",
            rusqlite::params![
                txn.description,
                txn.nature,
                txn.account_id,
                txn.category_id,
                txn.date,
                txn.value.abs(),
                txn.kind,
                txn.id
            ],
        )?;
        if updated == 0 {
            return Err(CuratelaError::NotFound(format!("transaction {}", txn.id)));
        }
        self.record("update", "transaction", Some(txn.id), &txn.description)
    }

    fn delete_transaction(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(CuratelaError::NotFound(format!("transaction {id}")));
        }
        self.record("delete", "transaction", Some(id), "")
    }

    fn insert_attachment(&self, transaction_id: i64, new: &NewAttachment) -> Result<Attachment> {
        self.conn.execute(
            "INSERT INTO attachments (transaction_id, name, mime_kind, storage_path) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![transaction_id, new.name, new.mime_kind, new.storage_path],
        )?;
        let id = self.conn.last_insert_rowid();
        self.record("create", "attachment", Some(id), &new.name)?;
        Ok(Attachment {
            id,
            transaction_id,
            name: new.name.clone(),
            mime_kind: new.mime_kind.clone(),
            storage_path: new.storage_path.clone(),
        })
    }

    fn list_documents(&self) -> Result<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, storage_path, created_at FROM documents ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Document {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    storage_path: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_document(&self, new: &NewDocument) -> Result<Document> {
        self.conn.execute(
            "INSERT INTO documents (title, storage_path) VALUES (?1, ?2)",
            rusqlite::params![new.title, new.storage_path],
        )?;
        let id = self.conn.last_insert_rowid();
        self.record("create", "document", Some(id), &new.title)?;
        let doc = self.conn.query_row(
            "SELECT id, title, storage_path, created_at FROM documents WHERE id = ?1",
            [id],
            |row| {
                Ok(Document {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    storage_path: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )?;
        Ok(doc)
    }

    fn delete_document(&self, id: i64) -> Result<()> {
        let deleted = self.conn.execute("DELETE FROM documents WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(CuratelaError::NotFound(format!("document {id}")));
        }
        self.record("delete", "document", Some(id), "")
    }

    fn list_activity(&self, limit: usize) -> Result<Vec<ActivityLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, action, entity, entity_id, detail, created_at FROM activity_logs \
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(ActivityLog {
                    id: row.get(0)?,
                    action: row.get(1)?,
                    entity: row.get(2)?,
                    entity_id: row.get(3)?,
                    detail: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
