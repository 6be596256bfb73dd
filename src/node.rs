//! A federation node: proposes signed blocks and validates what the other
//! members propose.

use crate::blockchain::Block;
use crate::config::Config;
use crate::consensus::{rules_from_config, ConsensusRules};
use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::transaction::Transaction;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Node {
    keypair: KeyPair,
    federation: Vec<String>,
    ledger: Arc<dyn Ledger>,
    rules: Arc<dyn ConsensusRules>,
    parallel_validation: bool,
}

impl Node {
    /// The node's own key always counts as part of the federation.
    pub fn new(
        keypair: KeyPair,
        mut federation: Vec<String>,
        ledger: Arc<dyn Ledger>,
        rules: Arc<dyn ConsensusRules>,
    ) -> Self {
        let own_key = keypair.public_key_hex();
        if !federation.contains(&own_key) {
            federation.push(own_key);
        }
        Self {
            keypair,
            federation,
            ledger,
            rules,
            parallel_validation: true,
        }
    }

    pub fn from_config(keypair: KeyPair, config: &Config, ledger: Arc<dyn Ledger>) -> Self {
        Self::new(
            keypair,
            config.federation.keyring.clone(),
            ledger,
            rules_from_config(config),
        )
        .with_parallel_validation(config.consensus.parallel_block_validation)
    }

    pub fn with_parallel_validation(mut self, parallel: bool) -> Self {
        self.parallel_validation = parallel;
        self
    }

    pub fn public_key(&self) -> String {
        self.keypair.public_key_hex()
    }

    pub fn federation(&self) -> &[String] {
        &self.federation
    }

    pub fn validate_transaction<'a>(
        &self,
        tx: &'a Transaction,
    ) -> Result<&'a Transaction, ChainError> {
        self.rules.validate_transaction(self.ledger.as_ref(), tx)
    }

    /// Packs `transactions` into a block signed by this node, with the whole
    /// federation as voters.
    pub fn create_block(&self, transactions: Vec<Transaction>) -> Result<Block, ChainError> {
        let block = Block::new(transactions)
            .with_node_pubkey(self.public_key())
            .with_voters(self.federation.clone())
            .sign(&self.keypair)?;
        info!(
            "Created block {} with {} transactions",
            block.id()?,
            block.transactions.len()
        );
        Ok(block)
    }

    /// Block checks followed by every transaction through the node's rules.
    pub fn validate_block<'b>(&self, block: &'b Block) -> Result<&'b Block, ChainError> {
        let ledger = self.ledger.as_ref();
        let rules = self.rules.as_ref();
        if !self.parallel_validation {
            return block.validate(ledger, rules, &self.federation).map_err(|e| {
                warn!("Rejected block from {:?}: {}", block.node_pubkey, e);
                e
            });
        }

        block.validate_block(&self.federation).map_err(|e| {
            warn!("Rejected block from {:?}: {}", block.node_pubkey, e);
            e
        })?;
        block.validate_block_transactions_parallel(ledger, rules)?;

        debug!("Block {} is valid", block.id()?);
        Ok(block)
    }
}
