use std::sync::Arc;

use anyhow::{Context, Result};
use flowbridge::{
    Bridge, InternalGateway, LocalGateway, Value,
    codec::wire::{BlockView, TransactionView},
};
use flowbridge_ledger::{
    AccountKey, Address, Engine, HashAlgorithm, Identifier, MemoryEngine, ProposalKey,
    SignatureAlgorithm, Transaction,
};
use futures::future::join_all;
use serde_json::json;
use tracing::Dispatch;

use super::common::decode_account;

fn gateway(engine: &Arc<MemoryEngine>) -> Result<InternalGateway> {
    let bridge = Bridge::new(4, Dispatch::none()).context("failed to build bridge")?;
    let engine: Arc<dyn Engine> = engine.clone();
    Ok(InternalGateway::new(bridge, Arc::new(LocalGateway::new(engine))))
}

#[tokio::test]
async fn get_account_reports_address_and_balance() -> Result<()> {
    let engine = Arc::new(MemoryEngine::new());
    let address = engine.create_account(42_000);
    let gateway = gateway(&engine)?;

    let raw = gateway
        .get_account(&format!("0x{address}"))
        .await
        .context("getAccount rejected")?;
    let account = decode_account(&raw)?;
    assert_eq!(account.address, address.hex());
    assert_eq!(account.balance, 42_000);
    assert_eq!(account.keys.len(), 1);

    let missing = gateway.get_account("0000000000000bad").await;
    let message = missing.expect_err("unknown account").message;
    assert_eq!(message, "account not found: 0000000000000bad");
    Ok(())
}

#[tokio::test]
async fn keys_without_client_codes_fail_to_encode() -> Result<()> {
    let engine = Arc::new(MemoryEngine::new());
    let owner = engine.create_account(1);
    engine.add_account_key(
        owner,
        AccountKey {
            index: 0,
            public_key: vec![7; 64],
            sig_algo: SignatureAlgorithm::EcdsaP256,
            hash_algo: HashAlgorithm::Keccak256,
            weight: 1000,
            sequence_number: 0,
            revoked: false,
        },
    )?;
    let gateway = gateway(&engine)?;

    let rejection = gateway
        .get_account(&owner.hex())
        .await
        .expect_err("Keccak_256 has no client code");
    assert_eq!(
        rejection.message,
        "encoding error: hash algorithm Keccak_256 has no client code"
    );

    let service = gateway
        .get_account("f8d6e0586b0a20c7")
        .await
        .context("service account still encodes")?;
    assert_eq!(decode_account(&service)?.keys.len(), 1);
    Ok(())
}

#[tokio::test]
async fn send_signed_transaction_returns_transaction_id() -> Result<()> {
    let engine = Arc::new(MemoryEngine::new());
    let gateway = gateway(&engine)?;
    let reference = engine.get_latest_block()?.id;

    let request = json!({
        "script": "transaction { execute { log(\"hi\") } }",
        "referenceBlockId": reference.hex(),
        "gasLimit": 9999,
        "arguments": [r#"{"type":"String","value":"hi"}"#],
    })
    .to_string();
    let raw = gateway
        .send_signed_transaction(&request)
        .await
        .context("sendSignedTransaction rejected")?;
    let id: String = raw.to_serde()?;

    let expected = Transaction {
        script: b"transaction { execute { log(\"hi\") } }".to_vec(),
        arguments: vec![br#"{"type":"String","value":"hi"}"#.to_vec()],
        reference_block_id: reference,
        gas_limit: 9999,
        proposal_key: ProposalKey::default(),
        payer: Address::EMULATOR_SERVICE,
        ..Transaction::default()
    };
    assert_eq!(id, expected.id().hex());

    let fetched: TransactionView = gateway.get_transaction(&id).await?.to_serde()?;
    assert_eq!(fetched.id, id);
    assert_eq!(fetched.payer, "f8d6e0586b0a20c7");

    let result = gateway.get_transaction_result(&id).await?.to_json_value()?;
    assert_eq!(result["status"], 4);
    assert_eq!(result["statusCode"], 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_queries_agree() -> Result<()> {
    let engine = Arc::new(MemoryEngine::new());
    for _ in 0..3 {
        engine.create_account(1);
    }
    let gateway = gateway(&engine)?;

    let blocks = join_all((0..16).map(|_| gateway.get_latest_block())).await;
    let accounts = join_all((0..16).map(|_| gateway.get_account("f8d6e0586b0a20c7"))).await;

    let mut ids = blocks
        .into_iter()
        .map(|raw| Ok(raw?.to_serde::<BlockView>()?.id))
        .collect::<Result<Vec<_>>>()?;
    ids.dedup();
    assert_eq!(ids, [engine.get_latest_block()?.id.hex()]);
    for raw in accounts {
        assert_eq!(decode_account(&raw?)?.address, "f8d6e0586b0a20c7");
    }
    Ok(())
}

#[tokio::test]
async fn blocks_by_height_and_id() -> Result<()> {
    let engine = Arc::new(MemoryEngine::new());
    engine.create_account(1);
    let gateway = gateway(&engine)?;

    let by_height: BlockView = gateway.get_block_by_height(1).await?.to_serde()?;
    let by_id: BlockView = gateway.get_block_by_id(&by_height.id).await?.to_serde()?;
    assert_eq!(by_height, by_id);
    assert_eq!(by_id.height, 1);

    let transactions = gateway
        .get_transactions_by_block_id(&by_id.id)
        .await?
        .to_json_value()?;
    assert_eq!(transactions.as_array().map(Vec::len), Some(1));

    let collection_id = &by_id.collection_guarantees[0].collection_id;
    let collection = gateway.get_collection(collection_id).await?.to_json_value()?;
    assert_eq!(collection["transactionIds"], json!([transactions[0]["id"].clone()]));

    let results = gateway
        .get_transaction_results_by_block_id(&by_id.id)
        .await?
        .to_json_value()?;
    assert_eq!(results[0]["events"][0]["type"], "flow.AccountCreated");

    let rejection = gateway.get_block_by_height(99).await.expect_err("no such block");
    assert_eq!(rejection.message, "block not found: height 99");
    Ok(())
}

#[tokio::test]
async fn scripts_resolve_against_the_requested_block() -> Result<()> {
    const SCRIPT: &str = "access(all) fun main(): UInt64 { return getCurrentBlock().height }";
    let engine = Arc::new(MemoryEngine::new());
    engine.register_script(SCRIPT, |ctx| {
        Ok(format!(
            r#"{{"type":"UInt64","value":"{}","args":{}}}"#,
            ctx.block.height,
            ctx.arguments.len()
        )
        .into_bytes())
    });
    engine.create_account(1);
    engine.create_account(1);
    let gateway = gateway(&engine)?;
    let genesis: Identifier = engine.get_block_by_height(0)?.id;

    let latest: String = gateway
        .execute_script(
            &json!({"script": SCRIPT, "arguments": r#"[{"type":"Int","value":"1"}]"#}).to_string(),
        )
        .await?
        .to_serde()?;
    assert_eq!(latest, r#"{"type":"UInt64","value":"2","args":1}"#);

    let at_height: String = gateway
        .execute_script_at_height(&json!({"script": SCRIPT, "height": 1}).to_string())
        .await?
        .to_serde()?;
    assert!(at_height.contains(r#""value":"1""#));

    let at_id: String = gateway
        .execute_script_at_id(&json!({"script": SCRIPT, "id": genesis.hex()}).to_string())
        .await?
        .to_serde()?;
    assert!(at_id.contains(r#""value":"0""#));

    let failed = gateway
        .execute_script(&json!({"script": "access(all) fun main() {}"}).to_string())
        .await
        .expect_err("unregistered script");
    assert_eq!(failed.message, "script execution failed: script is not executable");
    Ok(())
}

#[tokio::test]
async fn name_based_calls() -> Result<()> {
    let engine = Arc::new(MemoryEngine::new());
    let gateway = gateway(&engine)?;

    let params = gateway.call("getNetworkParameters", &[]).await?.to_json_value()?;
    assert_eq!(params, json!({"chainId": "flow-emulator"}));

    let block: BlockView = gateway
        .call("getBlockByHeight", &[Value::from(0_u64)])
        .await?
        .to_serde()?;
    assert_eq!(block.height, 0);

    let unknown = gateway
        .call("getLatestProtocolStateSnapshot", &[])
        .await
        .expect_err("not exposed");
    assert_eq!(
        unknown.message,
        "getLatestProtocolStateSnapshot is not implemented by the gateway object"
    );

    let missing = gateway.call("getAccount", &[]).await.expect_err("no argument");
    assert!(missing.message.starts_with("decode error: getAccount"));
    Ok(())
}
