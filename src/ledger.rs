//! Ledger collaborator: the read side of transaction storage that
//! validation calls into.

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::transaction::Transaction;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a stored transaction sits in the agreement pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Included in a block that was voted valid.
    Valid,
    /// Included in a block still waiting for votes.
    Undecided,
    /// Not yet included in any block.
    Backlog,
}

/// Abstraction for ledger backends. Implementations must be safe to query
/// from several validating threads at once.
pub trait Ledger: Send + Sync {
    fn get_transaction_with_status(
        &self,
        txid: &str,
    ) -> Result<Option<(Transaction, TxStatus)>, ChainError>;

    fn get_transaction(&self, txid: &str) -> Result<Option<Transaction>, ChainError> {
        Ok(self.get_transaction_with_status(txid)?.map(|(tx, _)| tx))
    }

    /// The transaction, in a valid or undecided block, that spends output
    /// `output` of `txid`.
    fn get_spent(&self, txid: &str, output: usize) -> Result<Option<Transaction>, ChainError>;
}

/// Ledger kept entirely in memory.
#[derive(Default)]
pub struct InMemoryLedger {
    transactions: RwLock<HashMap<String, (Transaction, TxStatus)>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `tx`, replacing any previous entry with the same id.
    pub fn insert(&self, tx: Transaction, status: TxStatus) {
        self.transactions.write().insert(tx.id.clone(), (tx, status));
    }

    pub fn set_status(&self, txid: &str, status: TxStatus) -> Result<(), ChainError> {
        let mut transactions = self.transactions.write();
        let entry = transactions
            .get_mut(txid)
            .ok_or_else(|| ChainError::LedgerError(format!("unknown transaction {}", txid)))?;
        entry.1 = status;
        Ok(())
    }

    /// Stores every transaction of `block` with the given status.
    pub fn write_block(&self, block: &Block, status: TxStatus) {
        let mut transactions = self.transactions.write();
        for tx in &block.transactions {
            transactions.insert(tx.id.clone(), (tx.clone(), status));
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Ledger for InMemoryLedger {
    fn get_transaction_with_status(
        &self,
        txid: &str,
    ) -> Result<Option<(Transaction, TxStatus)>, ChainError> {
        Ok(self.transactions.read().get(txid).cloned())
    }

    fn get_spent(&self, txid: &str, output: usize) -> Result<Option<Transaction>, ChainError> {
        let transactions = self.transactions.read();
        let spender = transactions
            .values()
            .filter(|(_, status)| matches!(status, TxStatus::Valid | TxStatus::Undecided))
            .map(|(tx, _)| tx)
            .find(|tx| {
                tx.inputs.iter().any(|input| {
                    input
                        .fulfills
                        .as_ref()
                        .is_some_and(|link| link.txid == txid && link.output == output)
                })
            });
        Ok(spender.cloned())
    }
}
