//! Ledger access, local or delegated to the host.

mod internal;
mod local;
mod remote;

use std::{collections::BTreeMap, fmt, sync::Arc};

use flowbridge_ledger::{
    Account, Address, Block, BlockEvents, Collection, Identifier, Transaction, TransactionResult,
};

pub use internal::{ExecuteScriptRequest, InternalGateway, SendSignedTransactionRequest};
pub use local::LocalGateway;
pub use remote::RemoteGateway;

use crate::error::{Error, Result};

pub const EMULATOR: &str = "emulator";
pub const TESTNET: &str = "testnet";
pub const MAINNET: &str = "mainnet";
pub const PREVIEWNET: &str = "previewnet";

/// Networks the sandbox cannot reach itself.
pub const REMOTE_NETWORKS: [&str; 3] = [TESTNET, MAINNET, PREVIEWNET];

/// The full set of ledger operations.
///
/// Every variant implements every operation. One that cannot be served by a
/// variant fails with [`Error::Unimplemented`].
pub trait Gateway: Send + Sync {
    /// Short name of the backing variant, used in logs and errors.
    fn variant(&self) -> &'static str;

    /// # Errors
    /// Domain or delegate faults.
    fn get_account(&self, address: Address) -> Result<Account>;

    /// Submits `tx` and returns it as accepted by the ledger.
    ///
    /// # Errors
    /// Domain or delegate faults.
    fn send_signed_transaction(&self, tx: Transaction) -> Result<Transaction>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_transaction(&self, id: Identifier) -> Result<Transaction>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_transaction_result(&self, id: Identifier) -> Result<TransactionResult>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_transaction_results_by_block_id(
        &self,
        block_id: Identifier,
    ) -> Result<Vec<TransactionResult>>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_transactions_by_block_id(&self, block_id: Identifier) -> Result<Vec<Transaction>>;

    /// # Errors
    /// Domain or delegate faults.
    fn execute_script(&self, script: &[u8], arguments: &[Vec<u8>]) -> Result<Vec<u8>>;

    /// # Errors
    /// Domain or delegate faults.
    fn execute_script_at_height(
        &self,
        script: &[u8],
        arguments: &[Vec<u8>],
        height: u64,
    ) -> Result<Vec<u8>>;

    /// # Errors
    /// Domain or delegate faults.
    fn execute_script_at_id(
        &self,
        script: &[u8],
        arguments: &[Vec<u8>],
        block_id: Identifier,
    ) -> Result<Vec<u8>>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_latest_block(&self) -> Result<Block>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_block_by_height(&self, height: u64) -> Result<Block>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_block_by_id(&self, id: Identifier) -> Result<Block>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_events(&self, event_type: &str, start: u64, end: u64) -> Result<Vec<BlockEvents>>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_collection(&self, id: Identifier) -> Result<Collection>;

    /// # Errors
    /// Domain or delegate faults.
    fn get_latest_protocol_state_snapshot(&self) -> Result<Vec<u8>>;

    /// # Errors
    /// Fails when the ledger is unreachable.
    fn ping(&self) -> Result<()>;

    /// # Errors
    /// Fails when the ledger never became reachable.
    fn wait_server(&self) -> Result<()>;

    fn secure_connection(&self) -> bool;
}

/// Gateways keyed by network name.
#[derive(Clone, Default)]
pub struct GatewaySet {
    gateways: BTreeMap<String, Arc<dyn Gateway>>,
}

impl fmt::Debug for GatewaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.gateways.iter().map(|(k, v)| (k, v.variant())))
            .finish()
    }
}

impl GatewaySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, network: impl Into<String>, gateway: Arc<dyn Gateway>) -> Self {
        self.gateways.insert(network.into(), gateway);
        self
    }

    /// # Errors
    /// [`Error::Project`] when no gateway serves `network`.
    pub fn get(&self, network: &str) -> Result<Arc<dyn Gateway>> {
        self.gateways
            .get(network)
            .cloned()
            .ok_or_else(|| Error::Project(format!("no gateway configured for network {network}")))
    }
}
