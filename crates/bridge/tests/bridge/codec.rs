use anyhow::{Context, Result};
use flowbridge::{
    Error, Value,
    codec::{self, Wire, decode_envelope, decode_enveloped},
};
use flowbridge_ledger::{
    Account, Address, Block, BlockEvents, Collection, Engine, MemoryEngine, Transaction,
    TransactionResult,
};
use serde_json::json;

use super::common::FUNGIBLE_TOKEN_ADDRESS;

/// Decoding an encoded entity and encoding it again is lossless.
fn assert_stable<T: Wire>(entity: &T) -> Result<()> {
    let encoded = codec::encode(entity).context("encode")?;
    let decoded: T = codec::decode(&encoded).context("decode")?;
    let again = codec::encode(&decoded).context("re-encode")?;
    assert_eq!(
        encoded.to_json_value()?,
        again.to_json_value()?,
        "unstable view"
    );
    Ok(())
}

#[test]
fn ledger_entities_survive_the_boundary() -> Result<()> {
    let engine = MemoryEngine::new();
    let owner = engine.create_account(500);
    let tx_id = engine
        .deploy_contract(
            owner,
            "Hello",
            b"access(all) contract Hello { init() {} }",
            false,
        )
        .context("deploy")?;

    let result = engine.get_transaction_result(tx_id)?;
    let block = engine.get_block_by_id(result.block_id)?;
    let collection_id = block.collection_guarantees[0].collection_id;

    assert_stable::<Account>(&engine.get_account(owner)?)?;
    assert_stable::<Transaction>(&engine.get_transaction(tx_id)?)?;
    assert_stable::<TransactionResult>(&result)?;
    assert_stable::<Block>(&block)?;
    assert_stable::<Collection>(&engine.get_collection(collection_id)?)?;
    assert_stable::<Vec<BlockEvents>>(&engine.get_events(
        "flow.AccountContractAdded",
        0,
        block.height,
    )?)?;
    Ok(())
}

#[test]
fn views_use_client_field_names() -> Result<()> {
    let engine = MemoryEngine::new();
    let account = engine.get_account(Address::EMULATOR_SERVICE)?;
    let view = codec::encode(&account)?.to_json_value()?;

    assert_eq!(view["address"], "f8d6e0586b0a20c7");
    assert_eq!(view["keys"][0]["signAlgo"], 1);
    assert_eq!(view["keys"][0]["signAlgoString"], "ECDSA_P256");
    assert_eq!(view["keys"][0]["hashAlgo"], 3);
    assert_eq!(view["keys"][0]["hashAlgoString"], "SHA3_256");

    engine.create_account(0);
    let latest = engine.get_latest_block()?;
    let tx = engine
        .get_transactions_by_block_id(latest.id)?
        .pop()
        .context("account creation transaction")?;
    let view = codec::encode(&tx)?.to_json_value()?;
    assert_eq!(view["id"], tx.id().hex());
    assert!(view["proposalKey"].get("keyId").is_some());

    let view = codec::encode(&latest)?.to_json_value()?;
    assert_eq!(view["signatures"], json!([]));
    assert_eq!(view["parentId"], engine.get_block_by_height(0)?.id.hex());
    Ok(())
}

#[test]
fn account_maps_may_arrive_as_json_strings() -> Result<()> {
    let raw = Value::from_json(&json!({
        "value": {
            "address": FUNGIBLE_TOKEN_ADDRESS,
            "balance": 10,
            "code": "",
            "contracts": r#"{"FungibleToken":"access(all) contract FungibleToken {}"}"#,
            "keys": r#"[{"index":0,"publicKey":"ab","signAlgo":2,"hashAlgo":1,"weight":1000,"sequenceNumber":7}]"#,
        },
        "error": "",
    })
    .to_string())?;

    let account: Account = decode_enveloped(&raw, "getAccount")?;
    assert_eq!(account.address.hex(), FUNGIBLE_TOKEN_ADDRESS);
    assert_eq!(
        account.contracts["FungibleToken"],
        b"access(all) contract FungibleToken {}"
    );
    assert_eq!(account.keys[0].sequence_number, 7);
    Ok(())
}

#[test]
fn envelope_faults_are_classified() -> Result<()> {
    let delegated = Value::from_json(r#"{"value": null, "error": "rate limited by access node"}"#)?;
    let err = decode_envelope(&delegated).expect_err("delegate fault");
    assert!(matches!(err, Error::Delegate(_)));
    assert_eq!(err.to_string(), "rate limited by access node");

    let bare = Value::from_json(r#"{"address": "01"}"#)?;
    assert!(matches!(decode_envelope(&bare), Err(Error::Protocol(_))));

    let empty = Value::from_json(r#"{"value": null, "error": null}"#)?;
    assert_eq!(decode_envelope(&empty)?, None);
    assert!(matches!(
        decode_enveloped::<Account>(&empty, "getAccount"),
        Err(Error::Decode(_))
    ));
    Ok(())
}

#[test]
fn unknown_algorithm_codes_are_decode_faults() -> Result<()> {
    let raw = Value::from_json(
        &json!({
            "address": "01",
            "balance": 0,
            "keys": [{"index": 0, "publicKey": "", "signAlgo": 9, "hashAlgo": 1,
                      "weight": 1, "sequenceNumber": 0}],
        })
        .to_string(),
    )?;
    let err = codec::decode::<Account>(&raw).expect_err("unknown code");
    assert!(err.to_string().contains("unknown signature algorithm code 9"));
    Ok(())
}
