//! Consensus rules applied to every transaction a node accepts.
//!
//! Nodes receive their rules as a [`ConsensusRules`] trait object. The
//! asset-aware rules live in a single [`AssetRulesEngine`] that runs an
//! ordered list of [`ValidationStep`]s.

use crate::asset::{Asset, AssetType};
use crate::config::{Config, PolicyConfig, RulesKind};
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::policy;
use crate::transaction::{Operation, Output, ResolvedInput, Transaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validation a node applies to incoming transactions.
pub trait ConsensusRules: Send + Sync {
    fn validate_transaction<'a>(
        &self,
        ledger: &dyn Ledger,
        tx: &'a Transaction,
    ) -> Result<&'a Transaction, ChainError>;
}

/// Transaction validation without any asset composition rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseConsensusRules;

impl ConsensusRules for BaseConsensusRules {
    fn validate_transaction<'a>(
        &self,
        ledger: &dyn Ledger,
        tx: &'a Transaction,
    ) -> Result<&'a Transaction, ChainError> {
        tx.validate(ledger, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStep {
    /// Per-asset-type composition rules, finishing with full transaction
    /// validation.
    Composition,
    /// The asset's policy script, if it has one.
    Policy,
}

pub struct AssetRulesEngine {
    steps: Vec<ValidationStep>,
    policy: PolicyConfig,
}

impl AssetRulesEngine {
    pub fn new(steps: Vec<ValidationStep>, policy: PolicyConfig) -> Self {
        Self { steps, policy }
    }

    pub fn composition() -> Self {
        Self::new(vec![ValidationStep::Composition], PolicyConfig::default())
    }

    /// Composition rules followed by asset policies.
    pub fn with_policy(policy: PolicyConfig) -> Self {
        Self::new(
            vec![ValidationStep::Composition, ValidationStep::Policy],
            policy,
        )
    }

    pub fn steps(&self) -> &[ValidationStep] {
        &self.steps
    }

    fn validate_composition(
        &self,
        ledger: &dyn Ledger,
        tx: &Transaction,
    ) -> Result<(), ChainError> {
        let input_txs = match tx.operation {
            Operation::Transfer => tx.get_input_txs(ledger)?,
            Operation::Create => Vec::new(),
        };

        let assets = resolve_asset(ledger, tx, &input_txs)?;
        let asset_type = effective_asset_type(&assets)?;
        debug!("Transaction {} carries a {} asset", tx.id, asset_type);

        match asset_type {
            AssetType::Pure => validate_pure(tx, &input_txs)?,
            AssetType::Mix => validate_mix(tx, &input_txs)?,
            AssetType::Composition => validate_composition_type(tx, &input_txs)?,
        }

        tx.validate(ledger, Some(&input_txs))?;
        Ok(())
    }
}

impl ConsensusRules for AssetRulesEngine {
    fn validate_transaction<'a>(
        &self,
        ledger: &dyn Ledger,
        tx: &'a Transaction,
    ) -> Result<&'a Transaction, ChainError> {
        let mut fully_validated = false;
        for step in &self.steps {
            let outcome = match step {
                ValidationStep::Composition => {
                    fully_validated = true;
                    self.validate_composition(ledger, tx)
                }
                ValidationStep::Policy => {
                    policy::validate_policy(ledger, tx, &self.policy).map(|_| ())
                }
            };
            if let Err(e) = outcome {
                warn!("Transaction {} failed {:?} validation: {}", tx.id, step, e);
                return Err(e);
            }
        }

        if !fully_validated {
            tx.validate(ledger, None)?;
        }
        Ok(tx)
    }
}

/// Builds the rules a node is configured with.
pub fn rules_from_config(config: &Config) -> Arc<dyn ConsensusRules> {
    match config.consensus.rules {
        RulesKind::Base => Arc::new(BaseConsensusRules),
        RulesKind::Composition => Arc::new(AssetRulesEngine::composition()),
        RulesKind::Policy => Arc::new(AssetRulesEngine::with_policy(config.policy.clone())),
    }
}

/// The assets a transaction creates or consumes.
///
/// A CREATE yields its own asset. A TRANSFER yields the asset of the CREATE
/// transaction behind every distinct asset id among its resolved inputs.
pub fn resolve_asset(
    ledger: &dyn Ledger,
    tx: &Transaction,
    input_txs: &[ResolvedInput],
) -> Result<Vec<Asset>, ChainError> {
    let asset = tx.asset.as_ref().ok_or_else(|| {
        ChainError::AssetNotFound(format!("Asset not found in transaction {}", tx.id))
    })?;

    match tx.operation {
        Operation::Create => Ok(vec![asset.clone()]),
        Operation::Transfer => {
            let sources = input_sources(input_txs);
            let asset_ids = Transaction::get_asset_ids(&sources)?;
            asset_ids
                .iter()
                .map(|asset_id| {
                    ledger
                        .get_transaction(asset_id)?
                        .and_then(|create| create.asset)
                        .ok_or_else(|| {
                            ChainError::AssetNotFound(format!(
                                "Asset {} not found in the ledger",
                                asset_id
                            ))
                        })
                })
                .collect()
        }
    }
}

/// The single composition type shared by `assets`; undeclared means pure.
pub fn effective_asset_type(assets: &[Asset]) -> Result<AssetType, ChainError> {
    let types: BTreeSet<AssetType> = assets
        .iter()
        .filter_map(|asset| asset.data().and_then(|data| data.asset_type()))
        .collect();

    if types.len() > 1 {
        return Err(ChainError::AssetMix(
            types
                .iter()
                .map(AssetType::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ));
    }
    Ok(types.into_iter().next().unwrap_or(AssetType::Pure))
}

/// A pure asset may only move as itself, and only in its full amount.
pub fn validate_pure(tx: &Transaction, input_txs: &[ResolvedInput]) -> Result<(), ChainError> {
    if tx.operation != Operation::Transfer {
        return Ok(());
    }
    if let Some(missing) = input_txs.iter().find(|r| r.input_tx.is_none()) {
        let txid = missing
            .input
            .fulfills
            .as_ref()
            .map(|link| link.txid.as_str())
            .unwrap_or_default();
        return Err(ChainError::InputDoesNotExist(format!(
            "input `{}` doesn't exist",
            txid
        )));
    }

    tx.validate_asset(&input_sources(input_txs))?;
    validate_amount_conservation(tx, input_txs)
}

/// Mixed assets carry no rules of their own.
pub fn validate_mix(_tx: &Transaction, _input_txs: &[ResolvedInput]) -> Result<(), ChainError> {
    Ok(())
}

/// A composition may draw on other assets, but amounts are conserved.
pub fn validate_composition_type(
    tx: &Transaction,
    input_txs: &[ResolvedInput],
) -> Result<(), ChainError> {
    if tx.operation != Operation::Transfer {
        return Ok(());
    }
    validate_amount_conservation(tx, input_txs)
}

pub fn validate_amount_conservation(
    tx: &Transaction,
    input_txs: &[ResolvedInput],
) -> Result<(), ChainError> {
    let consumed: Vec<&Output> = input_txs
        .iter()
        .filter_map(ResolvedInput::spent_output)
        .collect();
    tx.validate_amount(&consumed)
}

fn input_sources(input_txs: &[ResolvedInput]) -> Vec<&Transaction> {
    input_txs
        .iter()
        .filter_map(|r| r.input_tx.as_ref())
        .collect()
}
