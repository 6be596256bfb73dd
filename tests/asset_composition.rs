//! Integration tests for asset creation, transfer and composition rules

use assetchain::asset::{Asset, AssetData, AssetType};
use assetchain::consensus::{effective_asset_type, resolve_asset, AssetRulesEngine, ConsensusRules};
use assetchain::crypto::KeyPair;
use assetchain::error::ChainError;
use assetchain::ledger::{InMemoryLedger, TxStatus};
use assetchain::transaction::Transaction;
use serde_json::json;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Helper to issue a signed CREATE
fn create_asset(
    owner: &KeyPair,
    amount: u64,
    data: Option<AssetData>,
    nonce: u64,
) -> Result<Transaction, ChainError> {
    Transaction::create(
        vec![owner.public_key_hex()],
        vec![(vec![owner.public_key_hex()], amount)],
        data,
        Some(json!({ "nonce": nonce })),
    )?
    .sign(std::slice::from_ref(owner))
}

/// Helper to move every output of `source` to `to`
fn transfer_asset(
    source: &Transaction,
    from: &KeyPair,
    to: &KeyPair,
    amount: u64,
    asset_id: &str,
) -> Result<Transaction, ChainError> {
    Transaction::transfer(
        source.to_inputs(),
        vec![(vec![to.public_key_hex()], amount)],
        asset_id,
        None,
    )?
    .sign(std::slice::from_ref(from))
}

#[test]
fn test_asset_transfer() -> TestResult {
    let ledger = InMemoryLedger::new();
    let engine = AssetRulesEngine::composition();
    let alice = KeyPair::generate()?;
    let bob = KeyPair::generate()?;

    let create = create_asset(&alice, 1, None, 1)?;
    engine.validate_transaction(&ledger, &create)?;
    ledger.insert(create.clone(), TxStatus::Valid);

    let transfer = transfer_asset(&create, &alice, &bob, 1, &create.id)?;
    engine.validate_transaction(&ledger, &transfer)?;
    assert_eq!(transfer.asset_id()?, create.id);

    Ok(())
}

#[test]
fn test_validate_bad_asset_creation() -> TestResult {
    let alice = KeyPair::generate()?;
    let create = create_asset(&alice, 1, None, 1)?;

    let mut dict = create.to_dict()?;
    dict["asset"] = json!({"data": "a"});
    assert!(matches!(
        Transaction::from_dict(&dict),
        Err(ChainError::InvalidTransaction(_))
    ));

    Ok(())
}

#[test]
fn test_validate_transfer_asset_id_mismatch() -> TestResult {
    let ledger = InMemoryLedger::new();
    let alice = KeyPair::generate()?;
    let create = create_asset(&alice, 1, None, 1)?;
    ledger.insert(create.clone(), TxStatus::Valid);

    let unrelated = "a".repeat(64);
    let transfer = transfer_asset(&create, &alice, &alice, 1, &unrelated)?;
    assert!(matches!(
        AssetRulesEngine::composition().validate_transaction(&ledger, &transfer),
        Err(ChainError::AssetIdMismatch(_))
    ));

    Ok(())
}

#[test]
fn test_get_asset_id_create_transaction() -> TestResult {
    let alice = KeyPair::generate()?;
    let create = create_asset(&alice, 1, None, 1)?;
    assert_eq!(Transaction::get_asset_id(&[&create])?, create.id);
    Ok(())
}

#[test]
fn test_get_asset_id_transfer_transaction() -> TestResult {
    let alice = KeyPair::generate()?;
    let bob = KeyPair::generate()?;
    let create = create_asset(&alice, 1, None, 1)?;
    let transfer = transfer_asset(&create, &alice, &bob, 1, &create.id)?;

    assert_eq!(Transaction::get_asset_id(&[&transfer])?, create.id);
    assert_eq!(Transaction::get_asset_id(&[&create, &transfer])?, create.id);
    Ok(())
}

#[test]
fn test_asset_id_mismatch() -> TestResult {
    let alice = KeyPair::generate()?;
    let first = create_asset(&alice, 1, None, 1)?;
    let second = create_asset(&alice, 1, None, 2)?;

    assert!(matches!(
        Transaction::get_asset_id(&[&first, &second]),
        Err(ChainError::AssetIdMismatch(_))
    ));
    Ok(())
}

#[test]
fn test_create_invalid_divisible_asset() -> TestResult {
    let alice = KeyPair::generate()?;
    let mut create = create_asset(&alice, 1, None, 1)?;
    create.outputs[0].amount = 0;
    let create = create.sign(std::slice::from_ref(&alice))?;

    assert!(matches!(
        Transaction::from_dict(&create.to_dict()?),
        Err(ChainError::AmountError(_))
    ));
    Ok(())
}

#[test]
fn test_create_valid_divisible_asset() -> TestResult {
    let ledger = InMemoryLedger::new();
    let alice = KeyPair::generate()?;
    let create = create_asset(&alice, 2, None, 1)?;

    AssetRulesEngine::composition().validate_transaction(&ledger, &create)?;
    let restored = Transaction::from_dict(&serde_json::from_str(&serde_json::to_string(
        &create.to_dict()?,
    )?)?)?;
    assert_eq!(restored, create);
    Ok(())
}

#[test]
fn test_declared_types_must_agree() -> TestResult {
    let pure = Asset::definition(Some(AssetData::new().with_type(AssetType::Pure)));
    let composition =
        Asset::definition(Some(AssetData::new().with_type(AssetType::Composition)));
    let untyped = Asset::definition(None);

    assert!(matches!(
        effective_asset_type(&[pure.clone(), composition.clone()]),
        Err(ChainError::AssetMix(_))
    ));
    assert_eq!(effective_asset_type(&[composition])?, AssetType::Composition);
    assert_eq!(effective_asset_type(&[pure, untyped])?, AssetType::Pure);
    Ok(())
}

#[test]
fn test_transfer_resolves_to_the_created_asset() -> TestResult {
    let ledger = InMemoryLedger::new();
    let alice = KeyPair::generate()?;
    let data = AssetData::new()
        .with_type(AssetType::Composition)
        .with_field("parts", json!(["bolt", "nut"]));
    let create = create_asset(&alice, 3, Some(data), 1)?;
    ledger.insert(create.clone(), TxStatus::Valid);

    let transfer = transfer_asset(&create, &alice, &alice, 3, &create.id)?;
    let input_txs = transfer.get_input_txs(&ledger)?;
    let assets = resolve_asset(&ledger, &transfer, &input_txs)?;
    assert_eq!(assets.len(), 1);
    assert_eq!(Some(&assets[0]), create.asset.as_ref());

    AssetRulesEngine::composition().validate_transaction(&ledger, &transfer)?;
    let short = transfer_asset(&create, &alice, &alice, 2, &create.id)?;
    assert!(matches!(
        AssetRulesEngine::composition().validate_transaction(&ledger, &short),
        Err(ChainError::AmountError(_))
    ));
    Ok(())
}
