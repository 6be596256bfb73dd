/// Transaction types for AssetChain
use crate::asset::{Asset, AssetData};
use crate::crypto::{hash_data, KeyPair};
use crate::error::ChainError;
use crate::ledger::TxStatus;
use crate::utils::serialize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const TRANSACTION_VERSION: &str = "1.0";

/// Upper bound for a single output amount.
pub const MAX_AMOUNT: u64 = 9_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Transfer,
}

/// Points at one output of a previous transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionLink {
    pub txid: String,
    pub output: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub owners_before: Vec<String>,
    pub fulfills: Option<TransactionLink>,
    /// One hex signature per `owners_before` key, in the same order.
    pub fulfillment: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub public_keys: Vec<String>,
    pub amount: u64,
}

impl Output {
    pub fn new(public_keys: Vec<String>, amount: u64) -> Self {
        Output {
            public_keys,
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub version: String,
    pub operation: Operation,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    #[serde(default)]
    pub asset: Option<Asset>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// An input together with what the ledger knows about the transaction it
/// spends from. `input_tx` and `status` are `None` when the ledger has no
/// such transaction.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub input: Input,
    pub input_tx: Option<Transaction>,
    pub status: Option<TxStatus>,
}

impl ResolvedInput {
    /// The output this input consumes, if the source transaction is known.
    pub fn spent_output(&self) -> Option<&Output> {
        let link = self.input.fulfills.as_ref()?;
        self.input_tx.as_ref()?.outputs.get(link.output)
    }
}

impl Transaction {
    /// Issues a new asset. `recipients` pairs the keys of each output with
    /// its amount.
    pub fn create(
        owners_before: Vec<String>,
        recipients: Vec<(Vec<String>, u64)>,
        asset_data: Option<AssetData>,
        metadata: Option<Value>,
    ) -> Result<Self, ChainError> {
        if owners_before.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "CREATE needs at least one issuer".to_string(),
            ));
        }
        if recipients.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "CREATE needs at least one recipient".to_string(),
            ));
        }

        Transaction {
            id: String::new(),
            version: TRANSACTION_VERSION.to_string(),
            operation: Operation::Create,
            inputs: vec![Input {
                owners_before,
                fulfills: None,
                fulfillment: None,
            }],
            outputs: recipients
                .into_iter()
                .map(|(keys, amount)| Output::new(keys, amount))
                .collect(),
            asset: Some(Asset::definition(asset_data)),
            metadata,
        }
        .with_id()
    }

    /// Moves existing outputs of the asset `asset_id` to new owners.
    pub fn transfer(
        inputs: Vec<Input>,
        recipients: Vec<(Vec<String>, u64)>,
        asset_id: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<Self, ChainError> {
        if inputs.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "TRANSFER needs at least one input".to_string(),
            ));
        }
        if inputs.iter().any(|i| i.fulfills.is_none()) {
            return Err(ChainError::InvalidTransaction(
                "every TRANSFER input must reference an output".to_string(),
            ));
        }
        if recipients.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "TRANSFER needs at least one recipient".to_string(),
            ));
        }

        Transaction {
            id: String::new(),
            version: TRANSACTION_VERSION.to_string(),
            operation: Operation::Transfer,
            inputs,
            outputs: recipients
                .into_iter()
                .map(|(keys, amount)| Output::new(keys, amount))
                .collect(),
            asset: Some(Asset::link(asset_id)),
            metadata,
        }
        .with_id()
    }

    /// Unsigned inputs spending every output of this transaction.
    pub fn to_inputs(&self) -> Vec<Input> {
        (0..self.outputs.len())
            .filter_map(|index| self.to_input(index).ok())
            .collect()
    }

    /// Unsigned input spending output `index` of this transaction.
    pub fn to_input(&self, index: usize) -> Result<Input, ChainError> {
        let output = self.outputs.get(index).ok_or_else(|| {
            ChainError::InvalidTransaction(format!(
                "transaction {} has no output {}",
                self.id, index
            ))
        })?;
        Ok(Input {
            owners_before: output.public_keys.clone(),
            fulfills: Some(TransactionLink {
                txid: self.id.clone(),
                output: index,
            }),
            fulfillment: None,
        })
    }

    /// The canonical body with `id` removed and every fulfillment nulled.
    fn body_value(&self) -> Result<Value, ChainError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("id");
            if let Some(Value::Array(inputs)) = map.get_mut("inputs") {
                for input in inputs.iter_mut() {
                    if let Value::Object(input) = input {
                        input.insert("fulfillment".to_string(), Value::Null);
                    }
                }
            }
        }
        Ok(value)
    }

    /// Bytes covered by both the id and every input signature.
    pub fn signable_message(&self) -> Result<Vec<u8>, ChainError> {
        Ok(serialize(&self.body_value()?)?.into_bytes())
    }

    pub fn compute_id(&self) -> Result<String, ChainError> {
        Ok(hash_data(&self.signable_message()?))
    }

    fn with_id(mut self) -> Result<Self, ChainError> {
        self.id = self.compute_id()?;
        Ok(self)
    }

    /// Recomputes the id, then fulfills every input with one signature per
    /// owner. Every owner needs a matching key in `keys`.
    pub fn sign(mut self, keys: &[KeyPair]) -> Result<Self, ChainError> {
        self.id = self.compute_id()?;
        let message = self.signable_message()?;

        for input in self.inputs.iter_mut() {
            let mut signatures = Vec::with_capacity(input.owners_before.len());
            for owner in &input.owners_before {
                let key = keys
                    .iter()
                    .find(|k| &k.public_key_hex() == owner)
                    .ok_or_else(|| {
                        ChainError::InvalidTransaction(format!(
                            "no private key supplied for owner {}",
                            owner
                        ))
                    })?;
                signatures.push(key.sign(&message)?);
            }
            input.fulfillment = Some(signatures);
        }
        Ok(self)
    }

    pub fn to_dict(&self) -> Result<Value, ChainError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses and structurally validates a transaction, including the
    /// integrity of its id.
    pub fn from_dict(value: &Value) -> Result<Self, ChainError> {
        let tx: Transaction = serde_json::from_value(value.clone()).map_err(|e| {
            ChainError::InvalidTransaction(format!("schema validation failed: {}", e))
        })?;
        tx.validate_structure()?;
        Ok(tx)
    }

    /// Identity of the asset this transaction creates or moves.
    pub fn asset_id(&self) -> Result<String, ChainError> {
        match self.operation {
            Operation::Create => Ok(self.id.clone()),
            Operation::Transfer => self
                .asset
                .as_ref()
                .and_then(Asset::linked_id)
                .map(str::to_string)
                .ok_or_else(|| {
                    ChainError::AssetNotFound(format!("transaction {} links no asset", self.id))
                }),
        }
    }

    /// Distinct asset ids of `transactions`; more than one is an error.
    pub fn get_asset_ids(transactions: &[&Transaction]) -> Result<BTreeSet<String>, ChainError> {
        let ids = transactions
            .iter()
            .map(|tx| tx.asset_id())
            .collect::<Result<BTreeSet<_>, _>>()?;
        if ids.len() > 1 {
            return Err(ChainError::AssetIdMismatch(format!(
                "all inputs of a transaction need to have the same asset id, found {}",
                ids.iter().cloned().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(ids)
    }

    /// The single asset id shared by `transactions`.
    pub fn get_asset_id(transactions: &[&Transaction]) -> Result<String, ChainError> {
        Self::get_asset_ids(transactions)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ChainError::InvalidTransaction(
                    "cannot derive an asset id from an empty transaction list".to_string(),
                )
            })
    }
}
