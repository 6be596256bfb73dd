//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::crypto::KeyPair;
    use crate::error::ChainError;
    use crate::ledger::{InMemoryLedger, TxStatus};
    use serde_json::json;

    fn create_signed(owner: &KeyPair, amount: u64, nonce: u64) -> Transaction {
        Transaction::create(
            vec![owner.public_key_hex()],
            vec![(vec![owner.public_key_hex()], amount)],
            None,
            Some(json!({ "nonce": nonce })),
        )
        .unwrap()
        .sign(std::slice::from_ref(owner))
        .unwrap()
    }

    fn transfer_all(source: &Transaction, from: &KeyPair, to: &KeyPair, amount: u64) -> Transaction {
        Transaction::transfer(
            source.to_inputs(),
            vec![(vec![to.public_key_hex()], amount)],
            source.id.clone(),
            None,
        )
        .unwrap()
        .sign(std::slice::from_ref(from))
        .unwrap()
    }

    #[test]
    fn test_create_validates() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let tx = create_signed(&alice, 2, 1);
        assert!(tx.validate(&ledger, None).is_ok());
    }

    #[test]
    fn test_create_replay_is_rejected() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let tx = create_signed(&alice, 1, 1);
        ledger.insert(tx.clone(), TxStatus::Valid);
        assert!(matches!(
            tx.validate(&ledger, None),
            Err(ChainError::DuplicateTransaction(_))
        ));
    }

    #[test]
    fn test_unsigned_transaction_fails() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let tx = Transaction::create(
            vec![alice.public_key_hex()],
            vec![(vec![alice.public_key_hex()], 1)],
            None,
            None,
        )
        .unwrap();
        assert!(matches!(
            tx.validate(&ledger, None),
            Err(ChainError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_signature_from_wrong_key_fails() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let mallory = KeyPair::generate().unwrap();
        let mut tx = create_signed(&alice, 1, 1);
        let forged = mallory.sign(&tx.signable_message().unwrap()).unwrap();
        tx.inputs[0].fulfillment = Some(vec![forged]);
        assert!(matches!(
            tx.validate(&ledger, None),
            Err(ChainError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_signing_requires_every_owner_key() {
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let tx = Transaction::create(
            vec![alice.public_key_hex()],
            vec![(vec![alice.public_key_hex()], 1)],
            None,
            None,
        )
        .unwrap();
        assert!(tx.sign(&[bob]).is_err());
    }

    #[test]
    fn test_transfer_validates_against_ledger() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let create = create_signed(&alice, 3, 1);
        ledger.insert(create.clone(), TxStatus::Valid);

        let transfer = transfer_all(&create, &alice, &bob, 3);
        assert!(transfer.validate(&ledger, None).is_ok());
        assert_eq!(transfer.asset_id().unwrap(), create.id);
    }

    #[test]
    fn test_transfer_of_unknown_input_fails() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let create = create_signed(&alice, 1, 1);
        let transfer = transfer_all(&create, &alice, &alice, 1);
        assert!(matches!(
            transfer.validate(&ledger, None),
            Err(ChainError::InputDoesNotExist(_))
        ));
    }

    #[test]
    fn test_transfer_of_undecided_input_fails() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let create = create_signed(&alice, 1, 1);
        ledger.insert(create.clone(), TxStatus::Undecided);
        let transfer = transfer_all(&create, &alice, &alice, 1);
        assert!(matches!(
            transfer.validate(&ledger, None),
            Err(ChainError::TransactionNotInValidBlock(_))
        ));
    }

    #[test]
    fn test_double_spend_check() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let carol = KeyPair::generate().unwrap();
        let create = create_signed(&alice, 1, 1);
        ledger.insert(create.clone(), TxStatus::Valid);

        let to_bob = transfer_all(&create, &alice, &bob, 1);
        ledger.insert(to_bob.clone(), TxStatus::Valid);

        let to_carol = transfer_all(&create, &alice, &carol, 1);
        assert!(matches!(
            to_carol.validate(&ledger, None),
            Err(ChainError::DoubleSpendDetected(_))
        ));
        // The spender itself is not a double spend of its own inputs.
        assert!(to_bob.validate(&ledger, None).is_ok());
    }

    #[test]
    fn test_amount_conservation_failure() {
        let ledger = InMemoryLedger::new();
        let alice = KeyPair::generate().unwrap();
        let create = create_signed(&alice, 5, 1);
        ledger.insert(create.clone(), TxStatus::Valid);

        let surplus = transfer_all(&create, &alice, &alice, 6);
        assert!(matches!(
            surplus.validate(&ledger, None),
            Err(ChainError::AmountError(_))
        ));
        let deficit = transfer_all(&create, &alice, &alice, 4);
        assert!(matches!(
            deficit.validate(&ledger, None),
            Err(ChainError::AmountError(_))
        ));
    }

    #[test]
    fn test_validate_amount_is_strict() {
        let alice = KeyPair::generate().unwrap();
        let create = create_signed(&alice, 3, 1);
        let transfer = Transaction::transfer(
            create.to_inputs(),
            vec![
                (vec![alice.public_key_hex()], 1),
                (vec![alice.public_key_hex()], 2),
            ],
            create.id.clone(),
            None,
        )
        .unwrap();
        let three = Output::new(vec![alice.public_key_hex()], 3);
        let two = Output::new(vec![alice.public_key_hex()], 2);
        assert!(transfer.validate_amount(&[&three]).is_ok());
        assert!(transfer.validate_amount(&[&two]).is_err());
        assert!(transfer.validate_amount(&[&two, &two]).is_err());
    }

    #[test]
    fn test_zero_amount_is_rejected_by_from_dict() {
        let alice = KeyPair::generate().unwrap();
        let mut tx = create_signed(&alice, 1, 1);
        tx.outputs[0].amount = 0;
        let tx = tx.sign(std::slice::from_ref(&alice)).unwrap();
        assert!(matches!(
            Transaction::from_dict(&tx.to_dict().unwrap()),
            Err(ChainError::AmountError(_))
        ));
    }

    #[test]
    fn test_divisible_amount_round_trips() {
        let alice = KeyPair::generate().unwrap();
        let tx = create_signed(&alice, 2, 1);
        let back = Transaction::from_dict(&tx.to_dict().unwrap()).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.outputs[0].amount, 2);
    }

    #[test]
    fn test_explicit_null_asset_fields_round_trip() {
        let alice = KeyPair::generate().unwrap();
        let data = serde_json::from_value(json!({"name": "bolt", "script": null, "type": null}))
            .unwrap();
        let tx = Transaction::create(
            vec![alice.public_key_hex()],
            vec![(vec![alice.public_key_hex()], 1)],
            Some(data),
            None,
        )
        .unwrap()
        .sign(std::slice::from_ref(&alice))
        .unwrap();

        let dict = tx.to_dict().unwrap();
        assert_eq!(
            dict["asset"],
            json!({"data": {"name": "bolt", "script": null, "type": null}})
        );
        let back = Transaction::from_dict(&dict).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.to_dict().unwrap(), dict);
    }

    #[test]
    fn test_tampered_id_is_rejected() {
        let alice = KeyPair::generate().unwrap();
        let tx = create_signed(&alice, 1, 1);
        let mut dict = tx.to_dict().unwrap();
        dict["metadata"] = json!({"nonce": 99});
        assert!(matches!(
            Transaction::from_dict(&dict),
            Err(ChainError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_bad_asset_data_fails_schema() {
        let alice = KeyPair::generate().unwrap();
        let tx = create_signed(&alice, 1, 1);
        let mut dict = tx.to_dict().unwrap();
        dict["asset"] = json!({"data": "a"});
        assert!(matches!(
            Transaction::from_dict(&dict),
            Err(ChainError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_signing_does_not_change_id() {
        let alice = KeyPair::generate().unwrap();
        let unsigned = Transaction::create(
            vec![alice.public_key_hex()],
            vec![(vec![alice.public_key_hex()], 1)],
            None,
            None,
        )
        .unwrap();
        let signed = unsigned.clone().sign(std::slice::from_ref(&alice)).unwrap();
        assert_eq!(unsigned.id, signed.id);
    }

    #[test]
    fn test_asset_ids() {
        let alice = KeyPair::generate().unwrap();
        let first = create_signed(&alice, 1, 1);
        let second = create_signed(&alice, 1, 2);

        assert_eq!(first.asset_id().unwrap(), first.id);
        assert_eq!(Transaction::get_asset_id(&[&first]).unwrap(), first.id);
        assert!(matches!(
            Transaction::get_asset_id(&[&first, &second]),
            Err(ChainError::AssetIdMismatch(_))
        ));
        assert!(Transaction::get_asset_id(&[]).is_err());

        let transfer = transfer_all(&first, &alice, &alice, 1);
        assert_eq!(
            Transaction::get_asset_ids(&[&first, &transfer]).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_validate_asset_detects_relinked_transfer() {
        let alice = KeyPair::generate().unwrap();
        let create = create_signed(&alice, 1, 1);
        let mut transfer = transfer_all(&create, &alice, &alice, 1);
        assert!(transfer.validate_asset(&[&create]).is_ok());

        transfer.asset = Some(Asset::link("aaa"));
        assert!(matches!(
            transfer.validate_asset(&[&create]),
            Err(ChainError::AssetIdMismatch(_))
        ));
    }
}
