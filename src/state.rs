use crate::error::{CuratelaError, Result};
use crate::models::*;
use crate::store::DataStore;

pub const OPENING_BALANCE_LABEL: &str = "Saldo inicial";

/// In-memory view of accounts, categories and transactions. Loaded from a
/// `DataStore` and only ever changed through it, so the two stay in step.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub accounts: Vec<BankAccount>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
}

impl AppState {
    pub fn load(store: &dyn DataStore) -> Result<Self> {
        Ok(Self {
            accounts: store.list_accounts()?,
            categories: store.list_categories()?,
            transactions: store.list_transactions()?,
        })
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn account(&self, id: i64) -> Option<&BankAccount> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Exact match first, then case-insensitive.
    pub fn account_by_name(&self, name: &str) -> Result<&BankAccount> {
        let name = name.trim();
        self.accounts
            .iter()
            .find(|a| a.name == name)
            .or_else(|| self.accounts.iter().find(|a| a.name.to_lowercase() == name.to_lowercase()))
            .ok_or_else(|| CuratelaError::UnknownAccount(name.to_string()))
    }

    pub fn category(&self, id: i64) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        let key = name.trim().to_lowercase();
        self.categories.iter().find(|c| c.name.to_lowercase() == key)
    }

    /// Categories a transaction of `nature` may use.
    pub fn categories_for(&self, nature: Nature) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(move |c| c.category_type == nature)
    }

    pub fn transaction(&self, id: i64) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    /// Create an account. A non-zero opening balance is materialized as a
    /// checking-account transaction dated on the opening day.
    pub fn add_account(&mut self, store: &dyn DataStore, new: NewAccount) -> Result<BankAccount> {
        if new.name.trim().is_empty() {
            return Err(CuratelaError::Validation("Account name is required".into()));
        }
        if self
            .accounts
            .iter()
            .any(|a| a.name.to_lowercase() == new.name.trim().to_lowercase())
        {
            return Err(CuratelaError::Validation(format!(
                "Account name already exists: {}",
                new.name.trim()
            )));
        }
        let new = NewAccount {
            name: new.name.trim().to_string(),
            ..new
        };
        let account = store.insert_account(&new)?;
        self.accounts.push(account.clone());

        if crate::fmt::to_cents(new.initial_balance) != 0 {
            let nature = if new.initial_balance > 0.0 {
                Nature::Receita
            } else {
                Nature::Despesa
            };
            let category_id = self.opening_balance_category(store, nature)?;
            let seed = NewTransaction {
                description: OPENING_BALANCE_LABEL.to_string(),
                nature,
                account_id: account.id,
                category_id,
                date: new.opened_on,
                value: new.initial_balance.abs(),
                kind: TransactionKind::CheckingAccount,
            };
            let txn = store.insert_transaction(&seed)?;
            self.transactions.push(txn);
        }
        log::info!(target: "state", "account created: {}", account.name);
        Ok(account)
    }

    fn opening_balance_category(&mut self, store: &dyn DataStore, nature: Nature) -> Result<i64> {
        if let Some(c) = self
            .categories_for(nature)
            .find(|c| c.name.to_lowercase() == OPENING_BALANCE_LABEL.to_lowercase())
        {
            return Ok(c.id);
        }
        let created = store.insert_category(&NewCategory {
            name: OPENING_BALANCE_LABEL.to_string(),
            category_type: nature,
        })?;
        let id = created.id;
        self.categories.push(created);
        Ok(id)
    }

    pub fn update_account(&mut self, store: &dyn DataStore, account: BankAccount) -> Result<()> {
        if account.name.trim().is_empty() {
            return Err(CuratelaError::Validation("Account name is required".into()));
        }
        store.update_account(&account)?;
        if let Some(slot) = self.accounts.iter_mut().find(|a| a.id == account.id) {
            *slot = account;
        }
        Ok(())
    }

    fn is_opening_seed(&self, txn: &Transaction) -> bool {
        txn.description == OPENING_BALANCE_LABEL
            && txn.attachments.is_empty()
            && self
                .category(txn.category_id)
                .is_some_and(|c| c.name == OPENING_BALANCE_LABEL)
    }

    /// Delete an account. When its only transaction is the opening-balance
    /// seed, the seed goes with it; any other transaction keeps it in use.
    pub fn delete_account(&mut self, store: &dyn DataStore, id: i64) -> Result<()> {
        let own: Vec<&Transaction> = self.transactions.iter().filter(|t| t.account_id == id).collect();
        let seed = match own.as_slice() {
            [only] if self.is_opening_seed(only) => Some(only.id),
            _ => None,
        };
        if let Some(seed_id) = seed {
            store.delete_transaction(seed_id)?;
            self.transactions.retain(|t| t.id != seed_id);
        }
        store.delete_account(id)?;
        self.accounts.retain(|a| a.id != id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    fn check_category(&self, name: &str, category_type: Nature, except: Option<i64>) -> Result<()> {
        if name.trim().is_empty() {
            return Err(CuratelaError::Validation("Category name is required".into()));
        }
        let key = name.trim().to_lowercase();
        let taken = self.categories.iter().any(|c| {
            Some(c.id) != except && c.category_type == category_type && c.name.to_lowercase() == key
        });
        if taken {
            return Err(CuratelaError::Validation(format!(
                "Category name already exists: {}",
                name.trim()
            )));
        }
        Ok(())
    }

    pub fn add_category(&mut self, store: &dyn DataStore, new: NewCategory) -> Result<Category> {
        self.check_category(&new.name, new.category_type, None)?;
        let created = store.insert_category(&NewCategory {
            name: new.name.trim().to_string(),
            category_type: new.category_type,
        })?;
        self.categories.push(created.clone());
        Ok(created)
    }

    /// Persist an already-validated batch in one call.
    pub fn add_categories(&mut self, store: &dyn DataStore, batch: &[NewCategory]) -> Result<Vec<Category>> {
        let created = store.insert_categories(batch)?;
        self.categories.extend(created.iter().cloned());
        Ok(created)
    }

    pub fn update_category(&mut self, store: &dyn DataStore, category: Category) -> Result<()> {
        self.check_category(&category.name, category.category_type, Some(category.id))?;
        store.update_category(&category)?;
        if let Some(slot) = self.categories.iter_mut().find(|c| c.id == category.id) {
            *slot = category;
        }
        Ok(())
    }

    pub fn delete_category(&mut self, store: &dyn DataStore, id: i64) -> Result<()> {
        store.delete_category(id)?;
        self.categories.retain(|c| c.id != id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Form-level checks: positive value, known account, and a category whose
    /// type matches the nature.
    pub fn validate_transaction(&self, new: &NewTransaction) -> Result<()> {
        if new.description.trim().is_empty() {
            return Err(CuratelaError::Validation("Description is required".into()));
        }
        if !(new.value.is_finite() && crate::fmt::to_cents(new.value) > 0) {
            return Err(CuratelaError::Validation("Value must be greater than zero".into()));
        }
        if self.account(new.account_id).is_none() {
            return Err(CuratelaError::UnknownAccount(new.account_id.to_string()));
        }
        let Some(category) = self.category(new.category_id) else {
            return Err(CuratelaError::UnknownCategory(new.category_id.to_string()));
        };
        if category.category_type != new.nature {
            return Err(CuratelaError::Validation(format!(
                "Category '{}' is {} but the transaction is {}",
                category.name, category.category_type, new.nature
            )));
        }
        Ok(())
    }

    pub fn add_transaction(&mut self, store: &dyn DataStore, new: NewTransaction) -> Result<Transaction> {
        self.validate_transaction(&new)?;
        let txn = store.insert_transaction(&new)?;
        self.transactions.push(txn.clone());
        Ok(txn)
    }

    /// Batch insert without per-row validation; import flows validate first.
    pub fn add_transactions(&mut self, store: &dyn DataStore, batch: &[NewTransaction]) -> Result<Vec<Transaction>> {
        let created = store.insert_transactions(batch)?;
        self.transactions.extend(created.iter().cloned());
        Ok(created)
    }

    pub fn update_transaction(&mut self, store: &dyn DataStore, txn: Transaction) -> Result<()> {
        self.validate_transaction(&NewTransaction {
            description: txn.description.clone(),
            nature: txn.nature,
            account_id: txn.account_id,
            category_id: txn.category_id,
            date: txn.date,
            value: txn.value,
            kind: txn.kind,
        })?;
        store.update_transaction(&txn)?;
        if let Some(slot) = self.transactions.iter_mut().find(|t| t.id == txn.id) {
            slot.description = txn.description;
            slot.nature = txn.nature;
            slot.account_id = txn.account_id;
            slot.category_id = txn.category_id;
            slot.date = txn.date;
            slot.value = txn.value.abs();
            slot.kind = txn.kind;
        }
        Ok(())
    }

    /// Remove the row and hand it back so the caller can clean up stored
    /// attachment objects.
    pub fn delete_transaction(&mut self, store: &dyn DataStore, id: i64) -> Result<Transaction> {
        let Some(pos) = self.transactions.iter().position(|t| t.id == id) else {
            return Err(CuratelaError::NotFound(format!("transaction {id}")));
        };
        store.delete_transaction(id)?;
        Ok(self.transactions.remove(pos))
    }

    pub fn add_attachment(&mut self, store: &dyn DataStore, transaction_id: i64, new: &NewAttachment) -> Result<Attachment> {
        let att = store.insert_attachment(transaction_id, new)?;
        if let Some(txn) = self.transactions.iter_mut().find(|t| t.id == transaction_id) {
            txn.attachments.push(att.clone());
        }
        Ok(att)
    }
}
