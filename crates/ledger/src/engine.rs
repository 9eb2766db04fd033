use crate::types::{
    Account, Address, Block, BlockEvents, Collection, Identifier, Transaction, TransactionResult,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("account not found: {0}")]
    AccountNotFound(Address),
    #[error("transaction not found: {0}")]
    TransactionNotFound(Identifier),
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("collection not found: {0}")]
    CollectionNotFound(Identifier),
    #[error("script execution failed: {0}")]
    ScriptFailed(String),
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to deploy contract {name}: {message}")]
    ContractFailed { name: String, message: String },
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Block a script is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptTarget {
    #[default]
    Latest,
    Height(u64),
    BlockId(Identifier),
}

/// Ledger engine reached by the local gateway.
///
/// Every call is synchronous and may block; callers are expected to run it on
/// a sandbox execution unit. Implementations own their own synchronization.
pub trait Engine: Send + Sync + 'static {
    /// # Errors
    /// [`EngineError::AccountNotFound`] when no account exists at `address`.
    fn get_account(&self, address: Address) -> Result<Account>;

    /// Submits a transaction and returns its id.
    ///
    /// # Errors
    /// [`EngineError::InvalidTransaction`] when the engine rejects it.
    fn send_transaction(&self, tx: Transaction) -> Result<Identifier>;

    /// # Errors
    /// [`EngineError::TransactionNotFound`] for unknown ids.
    fn get_transaction(&self, id: Identifier) -> Result<Transaction>;

    /// # Errors
    /// [`EngineError::TransactionNotFound`] for unknown ids.
    fn get_transaction_result(&self, id: Identifier) -> Result<TransactionResult>;

    /// # Errors
    /// [`EngineError::BlockNotFound`] for unknown blocks.
    fn get_transaction_results_by_block_id(
        &self,
        block_id: Identifier,
    ) -> Result<Vec<TransactionResult>>;

    /// # Errors
    /// [`EngineError::BlockNotFound`] for unknown blocks.
    fn get_transactions_by_block_id(&self, block_id: Identifier) -> Result<Vec<Transaction>>;

    /// Runs a read-only script and returns its encoded result.
    ///
    /// # Errors
    /// [`EngineError::ScriptFailed`] when the script errors,
    /// [`EngineError::BlockNotFound`] when `target` does not resolve.
    fn execute_script(
        &self,
        script: &[u8],
        arguments: &[Vec<u8>],
        target: ScriptTarget,
    ) -> Result<Vec<u8>>;

    /// # Errors
    /// Engine-specific.
    fn get_latest_block(&self) -> Result<Block>;

    /// # Errors
    /// [`EngineError::BlockNotFound`] above the latest height.
    fn get_block_by_height(&self, height: u64) -> Result<Block>;

    /// # Errors
    /// [`EngineError::BlockNotFound`] for unknown ids.
    fn get_block_by_id(&self, id: Identifier) -> Result<Block>;

    /// Events of `event_type` in blocks `start..=end`, grouped per block.
    ///
    /// # Errors
    /// [`EngineError::InvalidArgument`] when `start > end`.
    fn get_events(&self, event_type: &str, start: u64, end: u64) -> Result<Vec<BlockEvents>>;

    /// # Errors
    /// [`EngineError::CollectionNotFound`] for unknown ids.
    fn get_collection(&self, id: Identifier) -> Result<Collection>;

    /// # Errors
    /// [`EngineError::Unsupported`] for engines without protocol state.
    fn get_latest_protocol_state_snapshot(&self) -> Result<Vec<u8>>;

    /// Deploys (or, with `update_existing`, replaces) a contract on `address`
    /// and returns the id of the deploying transaction.
    ///
    /// # Errors
    /// [`EngineError::ContractFailed`] when the code is rejected.
    fn deploy_contract(
        &self,
        address: Address,
        name: &str,
        code: &[u8],
        update_existing: bool,
    ) -> Result<Identifier>;

    fn service_address(&self) -> Address;
}
