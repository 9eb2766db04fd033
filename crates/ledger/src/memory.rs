use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use chrono::Utc;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    engine::{Engine, EngineError, Result, ScriptTarget},
    types::{
        Account, AccountKey, Address, Block, BlockEvents, Collection, CollectionGuarantee, Event,
        HashAlgorithm, Identifier, ProposalKey, SignatureAlgorithm, Transaction,
        TransactionResult, TransactionStatus,
    },
};

/// Inputs visible to a registered script handler.
pub struct ScriptContext<'a> {
    pub arguments: &'a [Vec<u8>],
    pub block: &'a Block,
}

pub type ScriptHandler = Arc<dyn Fn(&ScriptContext<'_>) -> Result<Vec<u8>> + Send + Sync>;

const FIRST_USER_ADDRESS: u64 = 0x01cf_0e2f_2f71_5450;
const SERVICE_KEY_WEIGHT: u32 = 1000;
const DEPLOY_SCRIPT: &str = "transaction(name: String, code: String) { prepare(signer: auth(Contracts) &Account) { signer.contracts.add(name: name, code: code.utf8) } }";
const UPDATE_SCRIPT: &str = "transaction(name: String, code: String) { prepare(signer: auth(Contracts) &Account) { signer.contracts.update(name: name, code: code.utf8) } }";

struct State {
    accounts: BTreeMap<Address, Account>,
    blocks: Vec<Block>,
    transactions: HashMap<Identifier, Transaction>,
    results: HashMap<Identifier, TransactionResult>,
    block_transactions: HashMap<Identifier, Vec<Identifier>>,
    collections: HashMap<Identifier, Collection>,
    scripts: HashMap<Vec<u8>, ScriptHandler>,
    next_address: u64,
}

impl State {
    fn latest(&self) -> &Block {
        // genesis is created in `MemoryEngine::new` and blocks are never removed
        self.blocks
            .last()
            .unwrap_or_else(|| unreachable!("memory engine without genesis block"))
    }

    fn block_by_id(&self, id: Identifier) -> Result<&Block> {
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| EngineError::BlockNotFound(id.hex()))
    }

    fn block_by_height(&self, height: u64) -> Result<&Block> {
        usize::try_from(height)
            .ok()
            .and_then(|h| self.blocks.get(h))
            .ok_or_else(|| EngineError::BlockNotFound(format!("height {height}")))
    }

    /// Seals `tx` into a fresh single-collection block.
    fn commit(
        &mut self,
        tx: Transaction,
        events: impl FnOnce(Identifier) -> Vec<Event>,
    ) -> Identifier {
        let id = tx.id();
        let collection = Collection {
            transaction_ids: vec![id],
        };
        let collection_id = collection.id();
        let parent = self.latest();
        let block = Block::seal(
            parent.id,
            parent.height + 1,
            Utc::now(),
            vec![CollectionGuarantee { collection_id }],
            Vec::new(),
        );
        let result = TransactionResult {
            status: TransactionStatus::Sealed,
            error: None,
            events: events(id),
            block_id: block.id,
            block_height: block.height,
        };
        debug!(tx = %id, height = block.height, "sealed transaction");

        self.collections.insert(collection_id, collection);
        self.block_transactions.insert(block.id, vec![id]);
        self.transactions.insert(id, tx);
        self.results.insert(id, result);
        self.blocks.push(block);
        id
    }
}

/// Engine keeping the whole ledger in memory.
///
/// Every accepted transaction is sealed immediately in a block of its own.
/// Transaction scripts are not interpreted; read-only scripts are answered by
/// handlers registered with [`MemoryEngine::register_script`].
pub struct MemoryEngine {
    service: Address,
    state: RwLock<State>,
}

impl fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryEngine")
            .field("service", &self.service)
            .field("accounts", &state.accounts.len())
            .field("height", &state.latest().height)
            .finish_non_exhaustive()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        let service = Address::EMULATOR_SERVICE;
        let genesis = Block::seal(
            Identifier::default(),
            0,
            Utc::now(),
            Vec::new(),
            Vec::new(),
        );

        let mut accounts = BTreeMap::new();
        accounts.insert(
            service,
            Account {
                address: service,
                balance: 1_000_000_000 * 100_000_000,
                keys: vec![derived_key(service, 0)],
                ..Account::default()
            },
        );

        Self {
            service,
            state: RwLock::new(State {
                accounts,
                blocks: vec![genesis],
                transactions: HashMap::new(),
                results: HashMap::new(),
                block_transactions: HashMap::new(),
                collections: HashMap::new(),
                scripts: HashMap::new(),
                next_address: FIRST_USER_ADDRESS,
            }),
        }
    }

    /// Creates an account with one full-weight key and returns its address.
    pub fn create_account(&self, balance: u64) -> Address {
        let mut state = self.state.write();
        let address = Address::from_u64(state.next_address);
        state.next_address += 1;
        state.accounts.insert(
            address,
            Account {
                address,
                balance,
                keys: vec![derived_key(address, 0)],
                ..Account::default()
            },
        );

        let tx = Transaction {
            script: b"transaction { prepare(signer: auth(BorrowValue) &Account) { Account(payer: signer) } }".to_vec(),
            payer: self.service,
            proposal_key: ProposalKey {
                address: self.service,
                key_index: 0,
                sequence_number: address.to_u64(),
            },
            authorizers: vec![self.service],
            ..Transaction::default()
        };
        state.commit(tx, |tx_id| {
            vec![Event {
                event_type: "flow.AccountCreated".to_owned(),
                transaction_id: tx_id,
                transaction_index: 0,
                event_index: 0,
                payload: event_payload(
                    "flow.AccountCreated",
                    &[("address", "Address", &format!("0x{address}"))],
                ),
            }]
        });
        address
    }

    /// Appends `key` to the account at `address` and returns the index it was
    /// given. The key's own `index` is ignored.
    ///
    /// # Errors
    /// [`EngineError::AccountNotFound`] when no account exists at `address`.
    pub fn add_account_key(&self, address: Address, key: AccountKey) -> Result<u32> {
        let mut state = self.state.write();
        let account = state
            .accounts
            .get_mut(&address)
            .ok_or(EngineError::AccountNotFound(address))?;
        let index = u32::try_from(account.keys.len()).unwrap_or(u32::MAX);
        let public_key = hex::encode(&key.public_key);
        account.keys.push(AccountKey { index, ..key });

        let tx = Transaction {
            script: b"transaction(key: String) { prepare(signer: auth(AddKey) &Account) {} }".to_vec(),
            arguments: vec![format!(r#"{{"type":"String","value":"{public_key}"}}"#).into_bytes()],
            payer: address,
            proposal_key: ProposalKey {
                address,
                key_index: 0,
                sequence_number: u64::from(index),
            },
            authorizers: vec![address],
            ..Transaction::default()
        };
        state.commit(tx, |tx_id| {
            vec![Event {
                event_type: "flow.AccountKeyAdded".to_owned(),
                transaction_id: tx_id,
                transaction_index: 0,
                event_index: 0,
                payload: event_payload(
                    "flow.AccountKeyAdded",
                    &[
                        ("address", "Address", &format!("0x{address}")),
                        ("keyIndex", "Int", &index.to_string()),
                    ],
                ),
            }]
        });
        Ok(index)
    }

    /// Registers `handler` as the result of executing `script`.
    pub fn register_script(
        &self,
        script: impl Into<Vec<u8>>,
        handler: impl Fn(&ScriptContext<'_>) -> Result<Vec<u8>> + Send + Sync + 'static,
    ) {
        self.state
            .write()
            .scripts
            .insert(script.into(), Arc::new(handler));
    }
}

fn derived_key(address: Address, index: u32) -> AccountKey {
    let seed = Sha256::new()
        .chain_update(address.as_bytes())
        .chain_update(index.to_be_bytes())
        .finalize();
    let tail = Sha256::digest(seed);
    let mut public_key = seed.to_vec();
    public_key.extend_from_slice(&tail);
    AccountKey {
        index,
        public_key,
        sig_algo: SignatureAlgorithm::EcdsaP256,
        hash_algo: HashAlgorithm::Sha3_256,
        weight: SERVICE_KEY_WEIGHT,
        sequence_number: 0,
        revoked: false,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// JSON-CDC event value with simple scalar fields. Field values must not need
/// escaping.
fn event_payload(id: &str, fields: &[(&str, &str, &str)]) -> Vec<u8> {
    let fields = fields
        .iter()
        .map(|(name, ty, value)| {
            format!(r#"{{"name":"{name}","value":{{"type":"{ty}","value":"{value}"}}}}"#)
        })
        .collect::<Vec<_>>()
        .join(",");
    format!(r#"{{"type":"Event","value":{{"id":"{id}","fields":[{fields}]}}}}"#).into_bytes()
}

impl Engine for MemoryEngine {
    fn get_account(&self, address: Address) -> Result<Account> {
        self.state
            .read()
            .accounts
            .get(&address)
            .cloned()
            .ok_or(EngineError::AccountNotFound(address))
    }

    fn send_transaction(&self, tx: Transaction) -> Result<Identifier> {
        if tx.script.is_empty() {
            return Err(EngineError::InvalidTransaction("empty script".to_owned()));
        }

        let mut state = self.state.write();
        if !state.accounts.contains_key(&tx.payer) {
            return Err(EngineError::InvalidTransaction(format!(
                "payer account {} does not exist",
                tx.payer
            )));
        }
        if !tx.reference_block_id.is_zero() {
            state.block_by_id(tx.reference_block_id).map_err(|_| {
                EngineError::InvalidTransaction(format!(
                    "unknown reference block {}",
                    tx.reference_block_id
                ))
            })?;
        }
        let id = tx.id();
        if state.transactions.contains_key(&id) {
            return Err(EngineError::InvalidTransaction(format!(
                "duplicate transaction {id}"
            )));
        }

        let proposer = tx.proposal_key;
        if let Some(key) = state
            .accounts
            .get_mut(&proposer.address)
            .and_then(|a| a.keys.get_mut(proposer.key_index as usize))
        {
            key.sequence_number += 1;
        }

        Ok(state.commit(tx, |_| Vec::new()))
    }

    fn get_transaction(&self, id: Identifier) -> Result<Transaction> {
        self.state
            .read()
            .transactions
            .get(&id)
            .cloned()
            .ok_or(EngineError::TransactionNotFound(id))
    }

    fn get_transaction_result(&self, id: Identifier) -> Result<TransactionResult> {
        self.state
            .read()
            .results
            .get(&id)
            .cloned()
            .ok_or(EngineError::TransactionNotFound(id))
    }

    fn get_transaction_results_by_block_id(
        &self,
        block_id: Identifier,
    ) -> Result<Vec<TransactionResult>> {
        let state = self.state.read();
        state.block_by_id(block_id)?;
        Ok(state
            .block_transactions
            .get(&block_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.results.get(id).cloned())
            .collect())
    }

    fn get_transactions_by_block_id(&self, block_id: Identifier) -> Result<Vec<Transaction>> {
        let state = self.state.read();
        state.block_by_id(block_id)?;
        Ok(state
            .block_transactions
            .get(&block_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.transactions.get(id).cloned())
            .collect())
    }

    fn execute_script(
        &self,
        script: &[u8],
        arguments: &[Vec<u8>],
        target: ScriptTarget,
    ) -> Result<Vec<u8>> {
        let state = self.state.read();
        let block = match target {
            ScriptTarget::Latest => state.latest(),
            ScriptTarget::Height(height) => state.block_by_height(height)?,
            ScriptTarget::BlockId(id) => state.block_by_id(id)?,
        };
        let handler = state
            .scripts
            .get(script)
            .ok_or_else(|| EngineError::ScriptFailed("script is not executable".to_owned()))?;
        handler(&ScriptContext { arguments, block })
    }

    fn get_latest_block(&self) -> Result<Block> {
        Ok(self.state.read().latest().clone())
    }

    fn get_block_by_height(&self, height: u64) -> Result<Block> {
        self.state.read().block_by_height(height).cloned()
    }

    fn get_block_by_id(&self, id: Identifier) -> Result<Block> {
        self.state.read().block_by_id(id).cloned()
    }

    fn get_events(&self, event_type: &str, start: u64, end: u64) -> Result<Vec<BlockEvents>> {
        if start > end {
            return Err(EngineError::InvalidArgument(format!(
                "start height {start} is greater than end height {end}"
            )));
        }

        let state = self.state.read();
        let end = end.min(state.latest().height);
        let mut out = Vec::new();
        for height in start..=end {
            let block = state.block_by_height(height)?;
            let events = state
                .block_transactions
                .get(&block.id)
                .into_iter()
                .flatten()
                .filter_map(|id| state.results.get(id))
                .flat_map(|r| r.events.iter())
                .filter(|e| e.event_type == event_type)
                .cloned()
                .collect();
            out.push(BlockEvents {
                block_id: block.id,
                height: block.height,
                block_timestamp: block.timestamp,
                events,
            });
        }
        Ok(out)
    }

    fn get_collection(&self, id: Identifier) -> Result<Collection> {
        self.state
            .read()
            .collections
            .get(&id)
            .cloned()
            .ok_or(EngineError::CollectionNotFound(id))
    }

    fn get_latest_protocol_state_snapshot(&self) -> Result<Vec<u8>> {
        Err(EngineError::Unsupported("protocol state snapshot"))
    }

    fn deploy_contract(
        &self,
        address: Address,
        name: &str,
        code: &[u8],
        update_existing: bool,
    ) -> Result<Identifier> {
        let failed = |message: &str| EngineError::ContractFailed {
            name: name.to_owned(),
            message: message.to_owned(),
        };

        if !is_identifier(name) {
            return Err(failed("invalid contract name"));
        }
        let source = std::str::from_utf8(code).map_err(|_| failed("code is not valid UTF-8"))?;
        if source.trim().is_empty() {
            return Err(failed("empty contract code"));
        }
        let declares = source
            .split_whitespace()
            .collect::<Vec<_>>()
            .windows(2)
            .any(|w| w[0] == "contract" && w[1].trim_end_matches('{') == name);
        if !declares {
            return Err(failed(&format!("code does not declare contract {name}")));
        }

        let mut state = self.state.write();
        let account = state
            .accounts
            .get_mut(&address)
            .ok_or(EngineError::AccountNotFound(address))?;
        let exists = account.contracts.contains_key(name);
        if exists && !update_existing {
            return Err(failed(&format!(
                "cannot overwrite existing contract with name \"{name}\""
            )));
        }
        account.contracts.insert(name.to_owned(), code.to_vec());

        let (script, event_type) = if exists {
            (UPDATE_SCRIPT, "flow.AccountContractUpdated")
        } else {
            (DEPLOY_SCRIPT, "flow.AccountContractAdded")
        };
        let tx = Transaction {
            script: script.as_bytes().to_vec(),
            arguments: vec![name.as_bytes().to_vec(), code.to_vec()],
            payer: self.service,
            authorizers: vec![address],
            proposal_key: ProposalKey {
                address: self.service,
                key_index: 0,
                sequence_number: state.transactions.len() as u64,
            },
            ..Transaction::default()
        };
        let id = state.commit(tx, |tx_id| {
            vec![Event {
                event_type: event_type.to_owned(),
                transaction_id: tx_id,
                transaction_index: 0,
                event_index: 0,
                payload: event_payload(
                    event_type,
                    &[
                        ("address", "Address", &format!("0x{address}")),
                        ("contract", "String", name),
                    ],
                ),
            }]
        });
        debug!(%address, name, updated = exists, "deployed contract");
        Ok(id)
    }

    fn service_address(&self) -> Address {
        self.service
    }
}
