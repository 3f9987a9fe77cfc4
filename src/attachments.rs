use crate::error::{CuratelaError, Result};
use crate::models::*;
use crate::state::AppState;
use crate::storage::{object_path, ObjectStore};
use crate::store::DataStore;

/// Remove an object without failing the caller; a leftover object is only
/// wasted space.
async fn remove_quietly<O: ObjectStore>(bucket: &O, path: &str) {
    if let Err(e) = bucket.remove(path).await {
        log::warn!(target: "attachments", "could not remove stored object {path}: {e}");
    }
}

/// Upload `bytes` and link them to a transaction. If the row cannot be
/// written the uploaded object is removed again.
pub async fn attach_file<O: ObjectStore>(
    state: &mut AppState,
    store: &dyn DataStore,
    bucket: &O,
    transaction_id: i64,
    name: &str,
    mime_kind: &str,
    bytes: &[u8],
) -> Result<Attachment> {
    if state.transaction(transaction_id).is_none() {
        return Err(CuratelaError::NotFound(format!("transaction {transaction_id}")));
    }
    let path = object_path(name);
    bucket.put(&path, bytes).await?;

    let new = NewAttachment {
        name: name.to_string(),
        mime_kind: mime_kind.to_string(),
        storage_path: path.clone(),
    };
    match state.add_attachment(store, transaction_id, &new) {
        Ok(att) => Ok(att),
        Err(e) => {
            remove_quietly(bucket, &path).await;
            Err(e)
        }
    }
}

/// Delete a transaction; its attachment rows go with it and the stored
/// objects are removed afterwards on a best-effort basis.
pub async fn delete_transaction<O: ObjectStore>(
    state: &mut AppState,
    store: &dyn DataStore,
    bucket: &O,
    id: i64,
) -> Result<Transaction> {
    let removed = state.delete_transaction(store, id)?;
    for att in &removed.attachments {
        remove_quietly(bucket, &att.storage_path).await;
    }
    Ok(removed)
}

/// Save a scanned receipt as a transaction, attaching the cleaned image
/// when there is one.
pub async fn record_receipt<O: ObjectStore>(
    state: &mut AppState,
    store: &dyn DataStore,
    bucket: &O,
    new: NewTransaction,
    image: Option<&[u8]>,
) -> Result<Transaction> {
    let txn = state.add_transaction(store, new)?;
    if let Some(bytes) = image {
        attach_file(state, store, bucket, txn.id, "recibo.jpg", "image/jpeg", bytes).await?;
    }
    Ok(state.transaction(txn.id).cloned().unwrap_or(txn))
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

pub async fn add_document<O: ObjectStore>(
    store: &dyn DataStore,
    bucket: &O,
    title: &str,
    filename: &str,
    bytes: &[u8],
) -> Result<Document> {
    let title = title.trim();
    if title.is_empty() {
        return Err(CuratelaError::Validation("Document title is required".into()));
    }
    let path = object_path(filename);
    bucket.put(&path, bytes).await?;
    let new = NewDocument {
        title: title.to_string(),
        storage_path: path.clone(),
    };
    match store.insert_document(&new) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            remove_quietly(bucket, &path).await;
            Err(e)
        }
    }
}

pub async fn delete_document<O: ObjectStore>(store: &dyn DataStore, bucket: &O, id: i64) -> Result<Document> {
    let doc = store
        .list_documents()?
        .into_iter()
        .find(|d| d.id == id)
        .ok_or_else(|| CuratelaError::NotFound(format!("document {id}")))?;
    store.delete_document(id)?;
    remove_quietly(bucket, &doc.storage_path).await;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBucket;
    use crate::store::tests::{test_store, ymd};
    use crate::store::SqliteStore;

    fn setup() -> (tempfile::TempDir, SqliteStore, LocalBucket, AppState, Transaction) {
        let (dir, store) = test_store();
        let bucket = LocalBucket::new(dir.path().join("bucket"));
        let mut state = AppState::load(&store).unwrap();
        let acct = state
            .add_account(
                &store,
                NewAccount {
                    name: "Conta".into(),
                    account_type: AccountType::ContaCorrente,
                    initial_balance: 0.0,
                    opened_on: ymd(2024, 1, 1),
                },
            )
            .unwrap();
        let food = state.category_by_name("Farmácia").unwrap().id;
        let txn = state
            .add_transaction(
                &store,
                NewTransaction {
                    description: "Remédio".into(),
                    nature: Nature::Despesa,
                    account_id: acct.id,
                    category_id: food,
                    date: ymd(2024, 3, 2),
                    value: 35.9,
                    kind: TransactionKind::CheckingAccount,
                },
            )
            .unwrap();
        (dir, store, bucket, state, txn)
    }

    fn bucket_files(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path().join("bucket"))
            .map(|rd| rd.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_attach_and_delete_cleans_up() {
        let (dir, store, bucket, mut state, txn) = setup();
        let att = attach_file(&mut state, &store, &bucket, txn.id, "nota.jpg", "image/jpeg", b"jpeg")
            .await
            .unwrap();
        assert_eq!(bucket.get(&att.storage_path).await.unwrap(), b"jpeg");
        assert_eq!(state.transaction(txn.id).unwrap().attachments.len(), 1);
        assert_eq!(bucket_files(&dir), 1);

        let removed = delete_transaction(&mut state, &store, &bucket, txn.id).await.unwrap();
        assert_eq!(removed.attachments.len(), 1);
        assert_eq!(bucket_files(&dir), 0);
        assert!(store.list_transactions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_row_removes_upload() {
        let (dir, store, bucket, mut state, txn) = setup();
        // Known to the in-memory state but gone from the store.
        store.delete_transaction(txn.id).unwrap();
        let result = attach_file(&mut state, &store, &bucket, txn.id, "nota.jpg", "image/jpeg", b"jpeg").await;
        assert!(result.is_err());
        assert_eq!(bucket_files(&dir), 0);
    }

    #[tokio::test]
    async fn test_attach_to_unknown_transaction() {
        let (_dir, store, bucket, mut state, _txn) = setup();
        let err = attach_file(&mut state, &store, &bucket, 999, "a.jpg", "image/jpeg", b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, CuratelaError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_record_receipt_with_image() {
        let (_dir, store, bucket, mut state, txn) = setup();
        let new = NewTransaction {
            description: "Farmácia Central".into(),
            nature: Nature::Despesa,
            account_id: txn.account_id,
            category_id: txn.category_id,
            date: ymd(2024, 3, 9),
            value: 42.5,
            kind: TransactionKind::CheckingAccount,
        };
        let saved = record_receipt(&mut state, &store, &bucket, new, Some(&b"clean"[..])).await.unwrap();
        assert_eq!(saved.attachments.len(), 1);
        assert_eq!(saved.attachments[0].mime_kind, "image/jpeg");
        let stored = store.list_transactions().unwrap();
        assert_eq!(stored.iter().find(|t| t.id == saved.id).unwrap().attachments.len(), 1);
    }

    #[tokio::test]
    async fn test_documents_lifecycle() {
        let (dir, store, bucket, _state, _txn) = setup();
        assert!(add_document(&store, &bucket, "  ", "a.pdf", b"%PDF").await.is_err());
        let doc = add_document(&store, &bucket, "Termo de curatela", "termo.pdf", b"%PDF")
            .await
            .unwrap();
        assert!(doc.storage_path.ends_with("-termo.pdf"));
        assert_eq!(bucket_files(&dir), 1);

        delete_document(&store, &bucket, doc.id).await.unwrap();
        assert!(store.list_documents().unwrap().is_empty());
        assert_eq!(bucket_files(&dir), 0);
        assert!(matches!(
            delete_document(&store, &bucket, doc.id).await,
            Err(CuratelaError::NotFound(_))
        ));
    }
}
