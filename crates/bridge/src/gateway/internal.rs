use std::sync::Arc;

use flowbridge_ledger::{Address, Identifier, ProposalKey, Transaction};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use super::Gateway;
use crate::{
    bridge::{Bridge, Deferred},
    codec::{self, NetworkParameters, Wire},
    error::{Error, Result},
    value::Value,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSignedTransactionRequest {
    pub script: String,
    #[serde(default)]
    pub reference_block_id: String,
    #[serde(default)]
    pub gas_limit: u64,
    /// Each argument already encoded by the client.
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl SendSignedTransactionRequest {
    /// Builds the transaction the emulator service account pays for, with
    /// an empty proposal key and no signatures.
    ///
    /// # Errors
    /// [`Error::Decode`] when the reference block id is not hex.
    pub fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            script: self.script.into_bytes(),
            arguments: self.arguments.into_iter().map(String::into_bytes).collect(),
            reference_block_id: Identifier::from_hex(&self.reference_block_id)?,
            gas_limit: self.gas_limit,
            proposal_key: ProposalKey::default(),
            payer: Address::EMULATOR_SERVICE,
            authorizers: Vec::new(),
            payload_signatures: Vec::new(),
            envelope_signatures: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteScriptRequest {
    pub script: String,
    /// JSON array of encoded argument values; empty for none.
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub id: Option<String>,
}

impl ExecuteScriptRequest {
    /// # Errors
    /// [`Error::Decode`] when `arguments` is not a JSON array.
    pub fn argument_list(&self) -> Result<Vec<Vec<u8>>> {
        if self.arguments.trim().is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<serde_json::Value> = serde_json::from_str(&self.arguments)
            .map_err(|e| Error::Decode(format!("script arguments: {e}")))?;
        values
            .iter()
            .map(|v| serde_json::to_vec(v).map_err(Error::from))
            .collect()
    }
}

fn parse<T: for<'de> Deserialize<'de>>(request: &str, what: &str) -> Result<T> {
    serde_json::from_str(request).map_err(|e| Error::Decode(format!("{what} request: {e}")))
}

fn script_output(bytes: Vec<u8>) -> Result<Value> {
    String::from_utf8(bytes)
        .map(Value::from)
        .map_err(|_| Error::Encoding("script result is not UTF-8".to_owned()))
}

/// The `gateway` object handed to the host.
///
/// Every operation runs on a sandbox execution unit and answers with the
/// encoded view of its result.
#[derive(Clone)]
pub struct InternalGateway {
    bridge: Bridge,
    gateway: Arc<dyn Gateway>,
}

impl std::fmt::Debug for InternalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalGateway")
            .field("variant", &self.gateway.variant())
            .finish_non_exhaustive()
    }
}

impl InternalGateway {
    pub const METHODS: [&'static str; 14] = [
        "getAccount",
        "getLatestBlock",
        "getBlockById",
        "getBlockByHeight",
        "getTransactionsByBlockId",
        "getTransaction",
        "getCollection",
        "sendSignedTransaction",
        "getNetworkParameters",
        "getTransactionResultsByBlockId",
        "getTransactionResult",
        "executeScript",
        "executeScriptAtHeight",
        "executeScriptAtId",
    ];

    #[must_use]
    pub fn new(bridge: Bridge, gateway: Arc<dyn Gateway>) -> Self {
        Self { bridge, gateway }
    }

    fn run<F>(&self, name: &'static str, work: F) -> Deferred<Value>
    where
        F: FnOnce(&dyn Gateway) -> Result<Value> + Send + 'static,
    {
        let gateway = Arc::clone(&self.gateway);
        self.bridge.spawn(name, move || work(gateway.as_ref()))
    }

    fn view<T, F>(&self, name: &'static str, work: F) -> Deferred<Value>
    where
        T: Wire,
        F: FnOnce(&dyn Gateway) -> Result<T> + Send + 'static,
    {
        self.run(name, move |gateway| codec::encode(&work(gateway)?))
    }

    pub fn get_account(&self, address: &str) -> Deferred<Value> {
        let address = address.to_owned();
        self.view("getAccount", move |g| {
            g.get_account(Address::from_hex(&address)?)
        })
    }

    pub fn get_latest_block(&self) -> Deferred<Value> {
        self.view("getLatestBlock", |g| g.get_latest_block())
    }

    pub fn get_block_by_id(&self, id: &str) -> Deferred<Value> {
        let id = id.to_owned();
        self.view("getBlockById", move |g| {
            g.get_block_by_id(Identifier::from_hex(&id)?)
        })
    }

    pub fn get_block_by_height(&self, height: u64) -> Deferred<Value> {
        self.view("getBlockByHeight", move |g| g.get_block_by_height(height))
    }

    pub fn get_transactions_by_block_id(&self, block_id: &str) -> Deferred<Value> {
        let block_id = block_id.to_owned();
        self.view("getTransactionsByBlockId", move |g| {
            g.get_transactions_by_block_id(Identifier::from_hex(&block_id)?)
        })
    }

    pub fn get_transaction(&self, id: &str) -> Deferred<Value> {
        let id = id.to_owned();
        self.view("getTransaction", move |g| {
            g.get_transaction(Identifier::from_hex(&id)?)
        })
    }

    pub fn get_collection(&self, id: &str) -> Deferred<Value> {
        let id = id.to_owned();
        self.view("getCollection", move |g| {
            g.get_collection(Identifier::from_hex(&id)?)
        })
    }

    /// Submits the transaction described by `request` (JSON) and resolves
    /// with its id as hex.
    pub fn send_signed_transaction(&self, request: &str) -> Deferred<Value> {
        let request = request.to_owned();
        self.run("sendSignedTransaction", move |g| {
            let tx = parse::<SendSignedTransactionRequest>(&request, "sendSignedTransaction")?
                .into_transaction()?;
            let sent = g.send_signed_transaction(tx)?;
            let id = sent.id();
            debug!(tx = %id, "transaction sent");
            Ok(Value::from(id.hex()))
        })
    }

    pub fn get_network_parameters(&self) -> Deferred<Value> {
        match Value::from_serde(&NetworkParameters::emulator()) {
            Ok(value) => Deferred::resolved(value),
            Err(err) => Deferred::rejected(Error::from(err)),
        }
    }

    pub fn get_transaction_results_by_block_id(&self, block_id: &str) -> Deferred<Value> {
        let block_id = block_id.to_owned();
        self.view("getTransactionResultsByBlockId", move |g| {
            g.get_transaction_results_by_block_id(Identifier::from_hex(&block_id)?)
        })
    }

    pub fn get_transaction_result(&self, id: &str) -> Deferred<Value> {
        let id = id.to_owned();
        self.view("getTransactionResult", move |g| {
            g.get_transaction_result(Identifier::from_hex(&id)?)
        })
    }

    pub fn execute_script(&self, request: &str) -> Deferred<Value> {
        let request = request.to_owned();
        self.run("executeScript", move |g| {
            let request = parse::<ExecuteScriptRequest>(&request, "executeScript")?;
            script_output(g.execute_script(request.script.as_bytes(), &request.argument_list()?)?)
        })
    }

    pub fn execute_script_at_height(&self, request: &str) -> Deferred<Value> {
        let request = request.to_owned();
        self.run("executeScriptAtHeight", move |g| {
            let request = parse::<ExecuteScriptRequest>(&request, "executeScriptAtHeight")?;
            let height = request
                .height
                .ok_or_else(|| Error::Decode("executeScriptAtHeight request: missing height".to_owned()))?;
            script_output(g.execute_script_at_height(
                request.script.as_bytes(),
                &request.argument_list()?,
                height,
            )?)
        })
    }

    pub fn execute_script_at_id(&self, request: &str) -> Deferred<Value> {
        let request = request.to_owned();
        self.run("executeScriptAtId", move |g| {
            let request = parse::<ExecuteScriptRequest>(&request, "executeScriptAtId")?;
            let id = request
                .id
                .as_deref()
                .ok_or_else(|| Error::Decode("executeScriptAtId request: missing id".to_owned()))?;
            script_output(g.execute_script_at_id(
                request.script.as_bytes(),
                &request.argument_list()?,
                Identifier::from_hex(id)?,
            )?)
        })
    }

    /// Invokes an operation by its host-visible name.
    pub fn call(&self, method: &str, args: &[Value]) -> Deferred<Value> {
        let outcome = match method {
            "getAccount" => arg::<String>(args, 0, method).map(|a| self.get_account(&a)),
            "getLatestBlock" => Ok(self.get_latest_block()),
            "getBlockById" => arg::<String>(args, 0, method).map(|a| self.get_block_by_id(&a)),
            "getBlockByHeight" => arg::<u64>(args, 0, method).map(|h| self.get_block_by_height(h)),
            "getTransactionsByBlockId" => {
                arg::<String>(args, 0, method).map(|a| self.get_transactions_by_block_id(&a))
            }
            "getTransaction" => arg::<String>(args, 0, method).map(|a| self.get_transaction(&a)),
            "getCollection" => arg::<String>(args, 0, method).map(|a| self.get_collection(&a)),
            "sendSignedTransaction" => {
                arg::<String>(args, 0, method).map(|a| self.send_signed_transaction(&a))
            }
            "getNetworkParameters" => Ok(self.get_network_parameters()),
            "getTransactionResultsByBlockId" => {
                arg::<String>(args, 0, method).map(|a| self.get_transaction_results_by_block_id(&a))
            }
            "getTransactionResult" => {
                arg::<String>(args, 0, method).map(|a| self.get_transaction_result(&a))
            }
            "executeScript" => arg::<String>(args, 0, method).map(|a| self.execute_script(&a)),
            "executeScriptAtHeight" => {
                arg::<String>(args, 0, method).map(|a| self.execute_script_at_height(&a))
            }
            "executeScriptAtId" => arg::<String>(args, 0, method).map(|a| self.execute_script_at_id(&a)),
            other => Err(Error::Unimplemented {
                operation: other.to_owned(),
                variant: "the gateway object",
            }),
        };
        outcome.unwrap_or_else(Deferred::rejected)
    }
}

fn arg<T: DeserializeOwned>(args: &[Value], index: usize, method: &str) -> Result<T> {
    args.get(index)
        .ok_or_else(|| Error::Decode(format!("{method}: missing argument {index}")))?
        .to_serde()
        .map_err(|e| Error::Decode(format!("{method}: {e}")))
}
