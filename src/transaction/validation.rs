/// Validation logic for transactions separated from type definitions
use crate::asset::Asset;
use crate::crypto::verify_signature;
use crate::error::ChainError;
use crate::ledger::{Ledger, TxStatus};
use crate::transaction::types::{
    Operation, Output, ResolvedInput, Transaction, MAX_AMOUNT, TRANSACTION_VERSION,
};
use std::collections::HashSet;

impl Output {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.amount < 1 {
            return Err(ChainError::AmountError(
                "`amount` needs to be greater than zero".to_string(),
            ));
        }
        if self.amount > MAX_AMOUNT {
            return Err(ChainError::AmountError(format!(
                "`amount` must be <= {}",
                MAX_AMOUNT
            )));
        }
        if self.public_keys.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "output must name at least one public key".to_string(),
            ));
        }
        Ok(())
    }
}

impl Transaction {
    /// Stateless checks: shape per operation, amounts and id integrity.
    pub fn validate_structure(&self) -> Result<(), ChainError> {
        if self.version != TRANSACTION_VERSION {
            return Err(ChainError::InvalidTransaction(format!(
                "unsupported transaction version {}",
                self.version
            )));
        }
        if self.inputs.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "transaction has no inputs".to_string(),
            ));
        }
        if self.outputs.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "transaction has no outputs".to_string(),
            ));
        }
        for output in &self.outputs {
            output.validate()?;
        }
        if self.inputs.iter().any(|i| i.owners_before.is_empty()) {
            return Err(ChainError::InvalidTransaction(
                "every input must name its owners".to_string(),
            ));
        }

        match self.operation {
            Operation::Create => {
                if self.inputs.iter().any(|i| i.fulfills.is_some()) {
                    return Err(ChainError::InvalidTransaction(
                        "a CREATE transaction may not spend outputs".to_string(),
                    ));
                }
                if let Some(Asset::Link { .. }) = self.asset {
                    return Err(ChainError::InvalidTransaction(
                        "a CREATE transaction must embed its asset data".to_string(),
                    ));
                }
            }
            Operation::Transfer => {
                if self.inputs.iter().any(|i| i.fulfills.is_none()) {
                    return Err(ChainError::InvalidTransaction(
                        "every TRANSFER input must reference an output".to_string(),
                    ));
                }
                if let Some(Asset::Definition { .. }) = self.asset {
                    return Err(ChainError::InvalidTransaction(
                        "a TRANSFER transaction must link an asset by id".to_string(),
                    ));
                }
            }
        }

        let expected = self.compute_id()?;
        if expected != self.id {
            return Err(ChainError::InvalidHash(format!(
                "transaction id {} does not match its content hash {}",
                self.id, expected
            )));
        }
        Ok(())
    }

    /// Looks up the source transaction of every input.
    pub fn get_input_txs(&self, ledger: &dyn Ledger) -> Result<Vec<ResolvedInput>, ChainError> {
        self.inputs
            .iter()
            .map(|input| {
                let found = match &input.fulfills {
                    Some(link) => ledger.get_transaction_with_status(&link.txid)?,
                    None => None,
                };
                let (input_tx, status) = match found {
                    Some((tx, status)) => (Some(tx), Some(status)),
                    None => (None, None),
                };
                Ok(ResolvedInput {
                    input: input.clone(),
                    input_tx,
                    status,
                })
            })
            .collect()
    }

    /// Checks that the asset id declared by this TRANSFER is the one its
    /// inputs actually carry.
    pub fn validate_asset(&self, input_transactions: &[&Transaction]) -> Result<(), ChainError> {
        let declared = self
            .asset
            .as_ref()
            .and_then(Asset::linked_id)
            .ok_or_else(|| {
                ChainError::AssetNotFound(format!("transaction {} links no asset", self.id))
            })?;
        let resolved = Transaction::get_asset_id(input_transactions)?;
        if resolved != declared {
            return Err(ChainError::AssetIdMismatch(format!(
                "the asset id of the inputs ({}) does not match the transaction's asset id ({})",
                resolved, declared
            )));
        }
        Ok(())
    }

    /// Strict conservation: what is consumed must equal what is produced.
    pub fn validate_amount(&self, consumed: &[&Output]) -> Result<(), ChainError> {
        let input_amount = sum_amounts(consumed.iter().copied())?;
        let output_amount = sum_amounts(self.outputs.iter())?;
        if input_amount != output_amount {
            return Err(ChainError::AmountError(format!(
                "the amount used in the inputs `{}` needs to be same as the amount used in the outputs `{}`",
                input_amount, output_amount
            )));
        }
        Ok(())
    }

    /// Full validation against the ledger.
    ///
    /// With `input_txs` supplied the caller has already resolved the inputs
    /// and taken responsibility for asset and amount checks; without it the
    /// transaction resolves its inputs and runs those checks itself.
    pub fn validate<'a>(
        &'a self,
        ledger: &dyn Ledger,
        input_txs: Option<&[ResolvedInput]>,
    ) -> Result<&'a Self, ChainError> {
        self.validate_structure()?;

        match self.operation {
            Operation::Create => {
                if ledger.get_transaction(&self.id)?.is_some() {
                    return Err(ChainError::DuplicateTransaction(format!(
                        "transaction `{}` already exists",
                        self.id
                    )));
                }
            }
            Operation::Transfer => match input_txs {
                Some(resolved) => self.validate_spends(ledger, resolved)?,
                None => {
                    let resolved = self.get_input_txs(ledger)?;
                    self.validate_spends(ledger, &resolved)?;

                    let sources: Vec<&Transaction> =
                        resolved.iter().filter_map(|r| r.input_tx.as_ref()).collect();
                    self.validate_asset(&sources)?;

                    let consumed: Vec<&Output> =
                        resolved.iter().filter_map(ResolvedInput::spent_output).collect();
                    self.validate_amount(&consumed)?;
                }
            },
        }

        self.inputs_valid()?;
        Ok(self)
    }

    fn validate_spends(
        &self,
        ledger: &dyn Ledger,
        resolved: &[ResolvedInput],
    ) -> Result<(), ChainError> {
        let mut seen = HashSet::new();
        for (index, r) in resolved.iter().enumerate() {
            let link = r.input.fulfills.as_ref().ok_or_else(|| {
                ChainError::InvalidTransaction(format!(
                    "input {} of a TRANSFER must reference an output",
                    index
                ))
            })?;
            if !seen.insert(link) {
                return Err(ChainError::DoubleSpendDetected(format!(
                    "output {} of `{}` is spent twice by `{}`",
                    link.output, link.txid, self.id
                )));
            }

            let input_tx = r.input_tx.as_ref().ok_or_else(|| {
                ChainError::InputDoesNotExist(format!("input `{}` doesn't exist", link.txid))
            })?;
            if r.status != Some(TxStatus::Valid) {
                return Err(ChainError::TransactionNotInValidBlock(format!(
                    "input `{}` does not exist in a valid block",
                    link.txid
                )));
            }
            let output = input_tx.outputs.get(link.output).ok_or_else(|| {
                ChainError::InputDoesNotExist(format!(
                    "output {} of transaction `{}` doesn't exist",
                    link.output, link.txid
                ))
            })?;

            if let Some(spender) = ledger.get_spent(&link.txid, link.output)? {
                if spender.id != self.id {
                    return Err(ChainError::DoubleSpendDetected(format!(
                        "output {} of `{}` was already spent by `{}`",
                        link.output, link.txid, spender.id
                    )));
                }
            }

            if r.input.owners_before != output.public_keys {
                return Err(ChainError::InvalidTransaction(format!(
                    "owners of input {} do not match the keys of the output it spends",
                    index
                )));
            }
        }
        Ok(())
    }

    /// Every input must carry one valid signature per owner over the
    /// canonical body.
    pub fn inputs_valid(&self) -> Result<(), ChainError> {
        let message = self.signable_message()?;
        for (index, input) in self.inputs.iter().enumerate() {
            let signatures = match &input.fulfillment {
                Some(sigs) if sigs.len() == input.owners_before.len() => sigs,
                _ => {
                    return Err(ChainError::InvalidSignature(format!(
                        "input {} of transaction {} is not fully signed",
                        index, self.id
                    )))
                }
            };
            for (owner, signature) in input.owners_before.iter().zip(signatures) {
                verify_signature(owner, &message, signature).map_err(|e| {
                    ChainError::InvalidSignature(format!("input {}: {}", index, e))
                })?;
            }
        }
        Ok(())
    }
}

fn sum_amounts<'a>(mut outputs: impl Iterator<Item = &'a Output>) -> Result<u64, ChainError> {
    outputs.try_fold(0u64, |acc, output| {
        acc.checked_add(output.amount)
            .ok_or_else(|| ChainError::AmountError("amount overflow".to_string()))
    })
}
