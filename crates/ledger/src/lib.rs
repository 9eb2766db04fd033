//! Ledger entities and the engine contract consumed by the bridge.
//!
//! The bridge never owns ledger state. Everything here is either a transient
//! view of engine state ([`types`]) or the narrow contract the engine is
//! reached through ([`engine::Engine`]). [`memory::MemoryEngine`] is a small
//! in-process engine used as the default local backend.

pub mod engine;
pub mod memory;
pub mod types;

pub use engine::{Engine, EngineError, ScriptTarget};
pub use memory::{MemoryEngine, ScriptContext, ScriptHandler};
pub use types::{
    Account, AccountKey, Address, Block, BlockEvents, BlockSeal, Collection, CollectionGuarantee,
    Event, HashAlgorithm, HexError, Identifier, ProposalKey, SignatureAlgorithm, Transaction,
    TransactionResult, TransactionSignature, TransactionStatus,
};
