//! The durable key/value store backing a node's local data.
//!
//! This wraps a single `sled` tree and implements the contract described in
//! the external-collaborator section of the design: `open`, `write_schema`,
//! `exists`, `get`, `get_all`, `set`, `remove`, `transaction`, `count`.
//! Values are opaque JSON terms (`serde_json::Value`) so the overlay never
//! has to know what a caller is storing.

use crate::error::StoreError;
use serde_json::Value;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::collections::BTreeMap;
use std::path::Path;

/// Handle to a node's local key/value tree.
///
/// Cloning is cheap: `sled::Db` and `sled::Tree` are themselves
/// reference-counted handles to the same underlying pages.
#[derive(Clone)]
pub struct Store {
    tree: sled::Tree,
}

const TREE_NAME: &str = "kv";

impl Store {
    /// Opens (or creates) the store at `path`.
    ///
    /// `write_schema` has no separate work to do for `sled` — trees are
    /// created lazily on first access — but the method stays as a no-op to
    /// keep the same call shape as the original store's schema install.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let tree = db.open_tree(TREE_NAME)?;
        let store = Store { tree };
        store.write_schema()?;
        Ok(store)
    }

    pub fn write_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    pub fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.tree.contains_key(key)?)
    }

    pub fn get(&self, key: &str, default: Option<Value>) -> Result<Option<Value>, StoreError> {
        match self.tree.get(key)? {
            Some(bytes) => {
                let value: Value =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                        key: key.to_string(),
                        source,
                    })?;
                Ok(Some(value))
            }
            None => Ok(default),
        }
    }

    pub fn get_all(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let mut out = BTreeMap::new();
        for entry in self.tree.iter() {
            let (key, bytes) = entry?;
            let key = String::from_utf8_lossy(&key).into_owned();
            let value: Value = serde_json::from_slice(&bytes).map_err(|source| {
                StoreError::Decode {
                    key: key.clone(),
                    source,
                }
            })?;
            out.insert(key, value);
        }
        Ok(out)
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(value)?;
        self.tree.insert(key, encoded)?;
        self.tree.flush()?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.tree.remove(key)?;
        self.tree.flush()?;
        Ok(())
    }

    /// Applies `pairs` in a single write transaction, committing atomically
    /// or rolling back entirely if encoding any value fails.
    pub fn set_bulk(&self, pairs: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let result: Result<(), TransactionError<StoreError>> =
            self.tree.transaction(|tx| {
                for (key, value) in pairs {
                    let encoded = serde_json::to_vec(value).map_err(|e| {
                        ConflictableTransactionError::Abort(StoreError::Encode(e))
                    })?;
                    tx.insert(key.as_bytes(), encoded)?;
                }
                Ok(())
            });
        result.map_err(|e| match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => StoreError::Io(inner),
        })?;
        self.tree.flush()?;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn crud_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();

        assert!(store.get_all().unwrap().is_empty());
        assert!(!store.exists("foo").unwrap());
        assert_eq!(store.get("foo", None).unwrap(), None);

        store.set("foo", &json!("bar")).unwrap();
        store.set("baz", &json!({"hello": "world"})).unwrap();

        assert!(store.exists("foo").unwrap());
        assert!(store.exists("baz").unwrap());
        assert!(!store.exists("wtf").unwrap());

        assert_eq!(store.get("foo", None).unwrap(), Some(json!("bar")));
        assert_eq!(
            store.get("baz", None).unwrap(),
            Some(json!({"hello": "world"}))
        );
        assert_eq!(
            store.get("wtf", Some(json!("test"))).unwrap(),
            Some(json!("test"))
        );

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);

        store.remove("foo").unwrap();
        store.remove("baz").unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn bulk_set_is_atomic_and_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();

        let mut pairs = BTreeMap::new();
        pairs.insert("a".to_string(), json!(1));
        pairs.insert("b".to_string(), json!(2));

        store.set_bulk(&pairs).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.get("a"), Some(&json!(1)));
        assert_eq!(all.get("b"), Some(&json!(2)));
    }
}
