use crate::blockchain::core::block::Block;
use crate::consensus::ConsensusRules;
use crate::error::ChainError;
use crate::ledger::Ledger;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Fails on the first transaction id that appears twice.
pub fn validate_no_duplicates(block: &Block) -> Result<(), ChainError> {
    let mut seen = HashMap::new();
    for (position, txid) in block.transaction_ids().enumerate() {
        if let Some(first) = seen.insert(txid, position) {
            return Err(ChainError::DuplicateTransaction(format!(
                "transaction {} appears at positions {} and {} of the block",
                txid, first, position
            )));
        }
    }
    Ok(())
}

/// Fails when two transactions of the block spend the same output.
pub fn validate_no_double_spend(block: &Block) -> Result<(), ChainError> {
    let mut seen_inputs = HashMap::new();
    for tx in &block.transactions {
        for link in tx.inputs.iter().filter_map(|input| input.fulfills.as_ref()) {
            if let Some(conflicting) = seen_inputs.insert(link, tx.id.as_str()) {
                if conflicting != tx.id {
                    return Err(ChainError::DoubleSpendDetected(format!(
                        "output {} of {} is spent by both {} and {}",
                        link.output, link.txid, conflicting, tx.id
                    )));
                }
            }
        }
    }
    Ok(())
}

impl Block {
    /// The claimed signer must be a federation member.
    pub fn validate_signer(&self, federation: &[String]) -> Result<(), ChainError> {
        let node_pubkey = self
            .node_pubkey
            .as_ref()
            .ok_or(ChainError::MissingNodePubkey)?;
        if !federation.contains(node_pubkey) {
            return Err(ChainError::UnauthorizedNode(format!(
                "only federation nodes can create blocks, {} is not one",
                node_pubkey
            )));
        }
        Ok(())
    }

    /// Structural and cryptographic checks, cheapest first.
    pub fn validate_block(&self, federation: &[String]) -> Result<(), ChainError> {
        validate_no_duplicates(self)?;
        validate_no_double_spend(self)?;
        self.validate_signer(federation)?;
        self.verify_signature()
    }

    /// Runs every transaction through `rules`, in order, after ruling out
    /// duplicates.
    pub fn validate_block_transactions(
        &self,
        ledger: &dyn Ledger,
        rules: &dyn ConsensusRules,
    ) -> Result<(), ChainError> {
        validate_no_duplicates(self)?;
        for tx in &self.transactions {
            rules.validate_transaction(ledger, tx).map_err(|e| {
                warn!("Transaction {} rejected in block: {}", tx.id, e);
                e
            })?;
        }
        Ok(())
    }

    /// Same as [`Block::validate_block_transactions`] but fans the
    /// transactions out over the rayon pool. Which error is reported when
    /// several transactions are invalid is unspecified.
    pub fn validate_block_transactions_parallel(
        &self,
        ledger: &dyn Ledger,
        rules: &dyn ConsensusRules,
    ) -> Result<(), ChainError> {
        validate_no_duplicates(self)?;
        self.transactions.par_iter().try_for_each(|tx| {
            rules
                .validate_transaction(ledger, tx)
                .map(|_| ())
                .map_err(|e| {
                    warn!("Transaction {} rejected in block: {}", tx.id, e);
                    e
                })
        })
    }

    /// Full validation of a received block.
    pub fn validate(
        &self,
        ledger: &dyn Ledger,
        rules: &dyn ConsensusRules,
        federation: &[String],
    ) -> Result<&Self, ChainError> {
        self.validate_block(federation)?;
        self.validate_block_transactions(ledger, rules)?;
        debug!(
            "Block with {} transactions from {:?} is valid",
            self.transactions.len(),
            self.node_pubkey
        );
        Ok(self)
    }
}
