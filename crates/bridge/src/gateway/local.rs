use std::sync::Arc;

use flowbridge_ledger::{
    Account, Address, Block, BlockEvents, Collection, Engine, Identifier, ScriptTarget,
    Transaction, TransactionResult,
};

use super::Gateway;
use crate::error::Result;

/// [`Gateway`] served by the in-process engine.
///
/// Adds no locking of its own. Concurrent units share the engine's state and
/// are only as isolated as the engine makes them: two bridged calls that both
/// mutate the ledger may interleave in any order.
#[derive(Clone)]
pub struct LocalGateway {
    engine: Arc<dyn Engine>,
}

impl LocalGateway {
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }
}

impl Gateway for LocalGateway {
    fn variant(&self) -> &'static str {
        "local"
    }

    fn get_account(&self, address: Address) -> Result<Account> {
        Ok(self.engine.get_account(address)?)
    }

    fn send_signed_transaction(&self, tx: Transaction) -> Result<Transaction> {
        let id = self.engine.send_transaction(tx)?;
        Ok(self.engine.get_transaction(id)?)
    }

    fn get_transaction(&self, id: Identifier) -> Result<Transaction> {
        Ok(self.engine.get_transaction(id)?)
    }

    fn get_transaction_result(&self, id: Identifier) -> Result<TransactionResult> {
        Ok(self.engine.get_transaction_result(id)?)
    }

    fn get_transaction_results_by_block_id(
        &self,
        block_id: Identifier,
    ) -> Result<Vec<TransactionResult>> {
        Ok(self.engine.get_transaction_results_by_block_id(block_id)?)
    }

    fn get_transactions_by_block_id(&self, block_id: Identifier) -> Result<Vec<Transaction>> {
        Ok(self.engine.get_transactions_by_block_id(block_id)?)
    }

    fn execute_script(&self, script: &[u8], arguments: &[Vec<u8>]) -> Result<Vec<u8>> {
        Ok(self
            .engine
            .execute_script(script, arguments, ScriptTarget::Latest)?)
    }

    fn execute_script_at_height(
        &self,
        script: &[u8],
        arguments: &[Vec<u8>],
        height: u64,
    ) -> Result<Vec<u8>> {
        Ok(self
            .engine
            .execute_script(script, arguments, ScriptTarget::Height(height))?)
    }

    fn execute_script_at_id(
        &self,
        script: &[u8],
        arguments: &[Vec<u8>],
        block_id: Identifier,
    ) -> Result<Vec<u8>> {
        Ok(self
            .engine
            .execute_script(script, arguments, ScriptTarget::BlockId(block_id))?)
    }

    fn get_latest_block(&self) -> Result<Block> {
        Ok(self.engine.get_latest_block()?)
    }

    fn get_block_by_height(&self, height: u64) -> Result<Block> {
        Ok(self.engine.get_block_by_height(height)?)
    }

    fn get_block_by_id(&self, id: Identifier) -> Result<Block> {
        Ok(self.engine.get_block_by_id(id)?)
    }

    fn get_events(&self, event_type: &str, start: u64, end: u64) -> Result<Vec<BlockEvents>> {
        Ok(self.engine.get_events(event_type, start, end)?)
    }

    fn get_collection(&self, id: Identifier) -> Result<Collection> {
        Ok(self.engine.get_collection(id)?)
    }

    fn get_latest_protocol_state_snapshot(&self) -> Result<Vec<u8>> {
        Ok(self.engine.get_latest_protocol_state_snapshot()?)
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn wait_server(&self) -> Result<()> {
        Ok(())
    }

    fn secure_connection(&self) -> bool {
        false
    }
}
