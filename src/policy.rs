//! Asset policies: optional scripts attached to an asset that every
//! transaction moving the asset has to satisfy.
//!
//! A policy is a list of conditions separated by `;`. Each condition is an
//! expression over two bindings, `tx` (the transaction as JSON) and
//! `ledger` (read only, through `ledger.get_transaction(id)` and
//! `ledger.get_asset(id)`), and must evaluate to `true`.
//!
//! ```text
//! len(tx.outputs) == 1;
//! sum(pluck(tx.outputs, "amount")) <= 100;
//! has(tx.metadata, "invoice") || reject("an invoice is required")
//! ```
//!
//! Scripts pass a textual screen ([`gate`]) before they are parsed. Nesting
//! depth is bounded, with every link of an operator or field chain counting
//! as one level, and so are ledger lookups. There are no loops, so every
//! evaluation terminates.

pub mod eval;
pub mod gate;
pub mod parser;

use crate::asset::{Asset, AssetData};
use crate::config::PolicyConfig;
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::transaction::Transaction;
use std::fmt;
use tracing::{debug, warn};

pub use eval::Interpreter;
pub use parser::{parse, Program};

/// Category of a policy failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    TypeError,
    KeyError,
    IndexError,
    LookupError,
    LimitExceeded,
    /// The script called `reject`.
    Rejected,
    /// A condition evaluated to `false`.
    AssertionError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::KeyError => "KeyError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::LookupError => "LookupError",
            ErrorKind::LimitExceeded => "LimitExceeded",
            ErrorKind::Rejected => "Rejected",
            ErrorKind::AssertionError => "AssertionError",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} : {}", self.kind, self.message)
    }
}

impl std::error::Error for ScriptError {}

impl From<ScriptError> for ChainError {
    fn from(err: ScriptError) -> Self {
        ChainError::PolicyRejected(format!("Asset script evaluation failed with {}", err))
    }
}

/// Runs the policy of the asset `tx` creates or moves, if it has one.
pub fn validate_policy<'a>(
    ledger: &dyn Ledger,
    tx: &'a Transaction,
    config: &PolicyConfig,
) -> Result<&'a Transaction, ChainError> {
    let asset = tx.asset.as_ref().ok_or_else(|| {
        ChainError::AssetNotFound(format!("Asset not found in transaction {}", tx.id))
    })?;

    let data = match asset {
        Asset::Link { id } => ledger
            .get_transaction(id)?
            .ok_or_else(|| {
                ChainError::AssetNotFound(format!("Asset {} not found in the ledger", id))
            })?
            .asset
            .and_then(|linked| linked.data().cloned()),
        Asset::Definition { data } => data.clone(),
    };

    let Some(script) = data.as_ref().and_then(AssetData::script) else {
        debug!("Transaction {} has no asset policy", tx.id);
        return Ok(tx);
    };

    evaluate_policy(ledger, tx, script, config)?;
    debug!("Transaction {} satisfies its asset policy", tx.id);
    Ok(tx)
}

/// Screens, parses and evaluates `script` against `tx`.
pub fn evaluate_policy(
    ledger: &dyn Ledger,
    tx: &Transaction,
    script: &str,
    config: &PolicyConfig,
) -> Result<(), ChainError> {
    let program = check_script(script, config)?;
    let mut interpreter = Interpreter::new(ledger, tx.to_dict()?, config.max_ledger_lookups);
    interpreter.run(&program).map_err(|e| {
        warn!("Policy rejected transaction {}: {}", tx.id, e);
        ChainError::from(e)
    })
}

/// The static screen and the parse, without evaluating anything.
pub fn check_script(script: &str, config: &PolicyConfig) -> Result<Program, ChainError> {
    gate::screen(script, config.max_script_len).map_err(|reason| {
        warn!("Refusing policy script: {}", reason);
        ChainError::PolicyRejected(format!(
            "Asset script might contain malicious code ({}):\n{}",
            reason, script
        ))
    })?;
    Ok(parse(script, config.max_depth)?)
}
