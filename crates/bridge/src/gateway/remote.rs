use flowbridge_ledger::{
    Account, Address, Block, BlockEvents, Collection, Identifier, Transaction, TransactionResult,
};
use serde::Serialize;

use super::Gateway;
use crate::{
    bridge::HostChannel,
    codec::{Wire, decode_envelope, decode_enveloped, decode_required},
    error::{Error, Result},
    host::gateway_capability,
    value::Value,
};

const VARIANT: &str = "the remote gateway";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptCall<'a> {
    script: &'a str,
    arguments: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

/// [`Gateway`] for networks only the host can reach.
///
/// Each call is forwarded to the host object `<network>Gateway` and the
/// enveloped reply decoded.
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    channel: HostChannel,
    target: String,
}

impl RemoteGateway {
    #[must_use]
    pub fn new(channel: HostChannel, network: &str) -> Self {
        Self {
            channel,
            target: gateway_capability(network),
        }
    }

    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.channel
            .call(&self.target, method, args)
            .map_err(|err| match err {
                Error::Unimplemented { .. } => not_served(method),
                err => err,
            })
    }

    fn fetch<T: Wire>(&self, method: &str, args: Vec<Value>) -> Result<T> {
        decode_enveloped(&self.call(method, args)?, method)
    }

    fn script(
        &self,
        method: &str,
        script: &[u8],
        arguments: &[Vec<u8>],
        height: Option<u64>,
        id: Option<Identifier>,
    ) -> Result<Vec<u8>> {
        let request = ScriptCall {
            script: utf8(script)?,
            arguments: arguments
                .iter()
                .map(|a| utf8(a.as_slice()))
                .collect::<Result<_>>()?,
            height,
            id: id.map(|id| id.hex()),
        };
        let raw = self.call(method, vec![Value::from_serde(&request)?])?;
        decode_required::<String>(&raw, method).map(String::into_bytes)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| Error::Encoding("script input is not UTF-8".to_owned()))
}

fn not_served(operation: &str) -> Error {
    Error::Unimplemented {
        operation: operation.to_owned(),
        variant: VARIANT,
    }
}

impl Gateway for RemoteGateway {
    fn variant(&self) -> &'static str {
        "remote"
    }

    fn get_account(&self, address: Address) -> Result<Account> {
        self.fetch("getAccount", vec![address.hex().into()])
    }

    fn send_signed_transaction(&self, tx: Transaction) -> Result<Transaction> {
        let view = Value::from_serde(&tx.to_view()?)?;
        self.fetch("sendSignedTransaction", vec![view])
    }

    fn get_transaction(&self, id: Identifier) -> Result<Transaction> {
        self.fetch("getTransaction", vec![id.hex().into()])
    }

    fn get_transaction_result(&self, id: Identifier) -> Result<TransactionResult> {
        self.fetch("getTransactionResult", vec![id.hex().into()])
    }

    fn get_transaction_results_by_block_id(
        &self,
        block_id: Identifier,
    ) -> Result<Vec<TransactionResult>> {
        self.fetch("getTransactionResultsByBlockId", vec![block_id.hex().into()])
    }

    fn get_transactions_by_block_id(&self, block_id: Identifier) -> Result<Vec<Transaction>> {
        self.fetch("getTransactionsByBlockId", vec![block_id.hex().into()])
    }

    fn execute_script(&self, script: &[u8], arguments: &[Vec<u8>]) -> Result<Vec<u8>> {
        self.script("executeScript", script, arguments, None, None)
    }

    fn execute_script_at_height(
        &self,
        script: &[u8],
        arguments: &[Vec<u8>],
        height: u64,
    ) -> Result<Vec<u8>> {
        self.script("executeScriptAtHeight", script, arguments, Some(height), None)
    }

    fn execute_script_at_id(
        &self,
        script: &[u8],
        arguments: &[Vec<u8>],
        block_id: Identifier,
    ) -> Result<Vec<u8>> {
        self.script("executeScriptAtId", script, arguments, None, Some(block_id))
    }

    fn get_latest_block(&self) -> Result<Block> {
        self.fetch("getLatestBlock", vec![])
    }

    fn get_block_by_height(&self, height: u64) -> Result<Block> {
        self.fetch("getBlockByHeight", vec![height.into()])
    }

    fn get_block_by_id(&self, id: Identifier) -> Result<Block> {
        self.fetch("getBlockById", vec![id.hex().into()])
    }

    fn get_events(&self, event_type: &str, start: u64, end: u64) -> Result<Vec<BlockEvents>> {
        self.fetch(
            "getEvents",
            vec![event_type.into(), start.into(), end.into()],
        )
    }

    fn get_collection(&self, id: Identifier) -> Result<Collection> {
        self.fetch("getCollection", vec![id.hex().into()])
    }

    fn get_latest_protocol_state_snapshot(&self) -> Result<Vec<u8>> {
        Err(not_served("getLatestProtocolStateSnapshot"))
    }

    fn ping(&self) -> Result<()> {
        decode_envelope(&self.call("ping", vec![])?).map(drop)
    }

    fn wait_server(&self) -> Result<()> {
        Err(not_served("waitServer"))
    }

    fn secure_connection(&self) -> bool {
        true
    }
}
