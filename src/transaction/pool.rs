use std::collections::HashSet;

use log::debug;

use super::model::Transaction;
use crate::blockchain::Block;

/// Pending transactions not yet committed to the chain.
///
/// Entries are keyed by transaction id and kept in admission order.
#[derive(Debug, Default)]
pub struct TransactionPool {
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
        }
    }

    /// Insert, or overwrite the entry with the same id in place.
    pub fn set(&mut self, tx: Transaction) {
        match self.transactions.iter_mut().find(|t| t.id == tx.id) {
            Some(slot) => {
                debug!("pool: replacing transaction {}", tx.id);
                *slot = tx;
            }
            None => {
                debug!("pool: admitting transaction {}", tx.id);
                self.transactions.push(tx);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Pending transaction sent from `address`, if any.
    pub fn existing_transaction(&self, address: &str) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|t| t.input.address() == Some(address))
    }

    /// Transactions that pass signature and totals checks, in pool order.
    /// Rejected entries are logged and left in the pool.
    pub fn valid_transactions(&self) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.is_valid())
            .cloned()
            .collect()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    /// Drop every pending transaction that already appears in `chain`.
    pub fn clear_blockchain_transactions(&mut self, chain: &[Block]) {
        let committed: HashSet<&str> = chain
            .iter()
            .flat_map(|b| b.transactions())
            .map(|tx| tx.id.as_str())
            .collect();

        let before = self.transactions.len();
        self.transactions.retain(|t| !committed.contains(t.id.as_str()));
        let removed = before - self.transactions.len();
        if removed > 0 {
            debug!(
                "pool: removed {} committed transactions ({} -> {})",
                removed,
                before,
                self.transactions.len()
            );
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{BlockData, Blockchain};
    use crate::transaction::TransactionInput;
    use crate::wallet::Wallet;
    use serde_json::json;

    #[test]
    fn set_adds_transaction() {
        let mut pool = TransactionPool::new();
        let tx = Transaction::new(&Wallet::new(), "foo-public-key", 50).unwrap();
        pool.set(tx.clone());
        assert_eq!(pool.get(&tx.id), Some(&tx));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn set_overwrites_by_id() {
        let sender = Wallet::new();
        let mut pool = TransactionPool::new();
        let mut tx = Transaction::new(&sender, "a", 50).unwrap();
        pool.set(tx.clone());

        tx.update(&sender, "b", 10).unwrap();
        pool.set(tx.clone());

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(&tx.id).unwrap().output_map["b"], 10);
    }

    #[test]
    fn finds_existing_transaction_by_input_address() {
        let sender = Wallet::new();
        let mut pool = TransactionPool::new();
        let tx = Transaction::new(&sender, "a", 50).unwrap();
        pool.set(tx.clone());
        pool.set(Transaction::reward("miner"));

        assert_eq!(pool.existing_transaction(&sender.public_key), Some(&tx));
        assert!(pool.existing_transaction("nobody").is_none());
    }

    #[test]
    fn valid_transactions_filters_tampered_entries() {
        let sender = Wallet::new();
        let mut pool = TransactionPool::new();
        let mut expected = Vec::new();

        for i in 0..10 {
            let mut tx = Transaction::new(&sender, "any-key", 100).unwrap();
            match i % 3 {
                0 => {
                    if let TransactionInput::Signed { amount, .. } = &mut tx.input {
                        *amount = 99_999;
                    }
                }
                1 => {
                    let forged = Wallet::new().sign(&json!("foo")).unwrap();
                    if let TransactionInput::Signed { signature, .. } = &mut tx.input {
                        *signature = forged;
                    }
                }
                _ => expected.push(tx.clone()),
            }
            pool.set(tx);
        }

        assert_eq!(pool.valid_transactions(), expected);
        // filtering never mutates the pool
        assert_eq!(pool.len(), 10);
    }

    #[test]
    fn clear_empties_pool() {
        let mut pool = TransactionPool::new();
        pool.set(Transaction::new(&Wallet::new(), "a", 1).unwrap());
        pool.clear();
        assert!(pool.is_empty());
    }

    #[test]
    fn clears_only_committed_transactions() {
        let mut blockchain = Blockchain::new();
        let mut pool = TransactionPool::new();
        let mut expected = Vec::new();

        for i in 0..6 {
            let tx = Transaction::new(&Wallet::new(), "foo", 20).unwrap();
            pool.set(tx.clone());
            if i % 2 == 0 {
                blockchain.add_block(vec![BlockData::Transaction(tx)]);
            } else {
                expected.push(tx);
            }
        }

        pool.clear_blockchain_transactions(&blockchain.chain);
        assert_eq!(pool.transactions(), expected.as_slice());
    }
}
