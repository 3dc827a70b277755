//! Concurrent map of outstanding transactions.
//!
//! `remove` is the only way out of the registry. Response delivery,
//! cancellation, and shutdown all go through it, so exactly one of them
//! obtains a given [`Transaction`].

use dashmap::{DashMap, mapref::entry::Entry};

use super::Transaction;
use crate::correlation::TransactionId;

/// Outstanding transactions keyed by [`TransactionId`].
#[derive(Debug, Default)]
pub struct TransactionRegistry(DashMap<TransactionId, Transaction>);

impl TransactionRegistry {
    /// Register `transaction` under `id`.
    ///
    /// # Errors
    ///
    /// Returns the transaction unchanged if `id` is already registered.
    pub fn insert(&self, id: TransactionId, transaction: Transaction) -> Result<(), Transaction> {
        match self.0.entry(id) {
            Entry::Occupied(_) => Err(transaction),
            Entry::Vacant(vacant) => {
                vacant.insert(transaction);
                Ok(())
            }
        }
    }

    /// Take the transaction registered under `id`, if any.
    pub fn remove(&self, id: TransactionId) -> Option<Transaction> {
        self.0.remove(&id).map(|(_, transaction)| transaction)
    }

    /// Whether `id` is currently registered.
    #[must_use]
    pub fn contains(&self, id: TransactionId) -> bool { self.0.contains_key(&id) }

    /// Number of registered transactions.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether no transactions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Remove every registered transaction.
    ///
    /// Entries registered while the drain runs may or may not be included.
    #[must_use]
    pub fn drain(&self) -> Vec<(TransactionId, Transaction)> {
        let ids: Vec<TransactionId> = self.0.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter_map(|id| self.0.remove(&id))
            .collect()
    }
}
