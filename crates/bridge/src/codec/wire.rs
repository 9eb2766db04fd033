//! Host-facing views of ledger entities.
//!
//! Field names and numeric encodings are consumed by an external client
//! library and must stay as they are. Fields derived from others (`id`,
//! `statusString`, `signAlgoString`, `hashAlgoString`, event `blockId`) are
//! written on encode and ignored on decode.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use flowbridge_ledger::{
    Account, AccountKey, Address, Block, BlockEvents, BlockSeal, Collection, CollectionGuarantee,
    Event, HashAlgorithm, Identifier, ProposalKey, SignatureAlgorithm, Transaction,
    TransactionResult, TransactionSignature, TransactionStatus,
};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

use super::{
    Wire,
    algo::{HashCode, SignatureCode},
};
use crate::error::{Error, Result};

fn hex_bytes(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| Error::Decode(format!("{s:?}: {e}")))
}

fn text(bytes: &[u8], what: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::Encoding(format!("{what} is not UTF-8")))
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

/// Accepts either the value itself or a JSON document holding it. Remote
/// gateways pass nested account maps as JSON strings.
fn inline_or_json<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field<T> {
        Inline(T),
        Json(String),
    }

    match Option::<Field<T>>::deserialize(deserializer)? {
        None => Ok(T::default()),
        Some(Field::Inline(value)) => Ok(value),
        Some(Field::Json(json)) => serde_json::from_str(&json).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKeyView {
    pub index: u32,
    pub public_key: String,
    pub sign_algo: u8,
    #[serde(default)]
    pub sign_algo_string: String,
    pub hash_algo: u8,
    #[serde(default)]
    pub hash_algo_string: String,
    pub weight: u32,
    pub sequence_number: u64,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub address: String,
    pub balance: u64,
    #[serde(default)]
    pub code: String,
    #[serde(default, deserialize_with = "inline_or_json")]
    pub contracts: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "inline_or_json")]
    pub keys: Vec<AccountKeyView>,
}

impl Wire for AccountKey {
    type View = AccountKeyView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(AccountKeyView {
            index: self.index,
            public_key: hex::encode(&self.public_key),
            sign_algo: SignatureCode::try_from(self.sig_algo)?.0,
            sign_algo_string: self.sig_algo.name().to_owned(),
            hash_algo: HashCode::try_from(self.hash_algo)?.0,
            hash_algo_string: self.hash_algo.name().to_owned(),
            weight: self.weight,
            sequence_number: self.sequence_number,
            revoked: self.revoked,
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        Ok(Self {
            index: view.index,
            public_key: hex_bytes(&view.public_key)?,
            sig_algo: SignatureAlgorithm::try_from(SignatureCode(view.sign_algo))?,
            hash_algo: HashAlgorithm::try_from(HashCode(view.hash_algo))?,
            weight: view.weight,
            sequence_number: view.sequence_number,
            revoked: view.revoked,
        })
    }
}

impl Wire for Account {
    type View = AccountView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(AccountView {
            address: self.address.hex(),
            balance: self.balance,
            code: text(&self.code, "account code")?,
            contracts: self
                .contracts
                .iter()
                .map(|(name, code)| Ok((name.clone(), text(code, name)?)))
                .collect::<Result<_>>()?,
            keys: self.keys.to_view()?,
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        Ok(Self {
            address: Address::from_hex(&view.address)?,
            balance: view.balance,
            code: view.code.into_bytes(),
            contracts: view
                .contracts
                .into_iter()
                .map(|(name, code)| (name, code.into_bytes()))
                .collect(),
            keys: Vec::from_view(view.keys)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalKeyView {
    pub address: String,
    pub key_id: u32,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureView {
    pub addr: String,
    pub key_id: u32,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(default)]
    pub id: String,
    pub script: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub reference_block_id: String,
    pub gas_limit: u64,
    pub proposal_key: ProposalKeyView,
    pub payer: String,
    #[serde(default)]
    pub authorizers: Vec<String>,
    #[serde(default)]
    pub payload_signatures: Vec<SignatureView>,
    #[serde(default)]
    pub envelope_signatures: Vec<SignatureView>,
}

impl Wire for TransactionSignature {
    type View = SignatureView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(SignatureView {
            addr: self.address.hex(),
            key_id: self.key_index,
            signature: hex::encode(&self.signature),
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        Ok(Self {
            address: Address::from_hex(&view.addr)?,
            key_index: view.key_id,
            signature: hex_bytes(&view.signature)?,
        })
    }
}

impl Wire for Transaction {
    type View = TransactionView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(TransactionView {
            id: self.id().hex(),
            script: text(&self.script, "transaction script")?,
            args: self
                .arguments
                .iter()
                .map(|arg| text(arg, "transaction argument"))
                .collect::<Result<_>>()?,
            reference_block_id: self.reference_block_id.hex(),
            gas_limit: self.gas_limit,
            proposal_key: ProposalKeyView {
                address: self.proposal_key.address.hex(),
                key_id: self.proposal_key.key_index,
                sequence_number: self.proposal_key.sequence_number,
            },
            payer: self.payer.hex(),
            authorizers: self.authorizers.iter().map(Address::hex).collect(),
            payload_signatures: self.payload_signatures.to_view()?,
            envelope_signatures: self.envelope_signatures.to_view()?,
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        Ok(Self {
            script: view.script.into_bytes(),
            arguments: view.args.into_iter().map(String::into_bytes).collect(),
            reference_block_id: Identifier::from_hex(&view.reference_block_id)?,
            gas_limit: view.gas_limit,
            proposal_key: ProposalKey {
                address: Address::from_hex(&view.proposal_key.address)?,
                key_index: view.proposal_key.key_id,
                sequence_number: view.proposal_key.sequence_number,
            },
            payer: Address::from_hex(&view.payer)?,
            authorizers: view
                .authorizers
                .iter()
                .map(|a| Address::from_hex(a).map_err(Error::from))
                .collect::<Result<_>>()?,
            payload_signatures: Vec::from_view(view.payload_signatures)?,
            envelope_signatures: Vec::from_view(view.envelope_signatures)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: String,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub block_height: u64,
    pub transaction_id: String,
    pub transaction_index: u32,
    pub event_index: u32,
}

impl EventView {
    /// # Errors
    /// [`Error::Encoding`] when the payload is not UTF-8.
    pub fn new(event: &Event, block_id: Identifier, block_height: u64) -> Result<Self> {
        Ok(Self {
            event_type: event.event_type.clone(),
            data: text(&event.payload, "event payload")?,
            block_id: block_id.hex(),
            block_height,
            transaction_id: event.transaction_id.hex(),
            transaction_index: event.transaction_index,
            event_index: event.event_index,
        })
    }

    fn into_event(self) -> Result<Event> {
        Ok(Event {
            event_type: self.event_type,
            transaction_id: Identifier::from_hex(&self.transaction_id)?,
            transaction_index: self.transaction_index,
            event_index: self.event_index,
            payload: self.data.into_bytes(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResultView {
    pub block_id: String,
    #[serde(default)]
    pub block_height: u64,
    pub status: u8,
    #[serde(default)]
    pub status_string: String,
    #[serde(default)]
    pub error_message: String,
    pub status_code: u8,
    #[serde(default)]
    pub events: Vec<EventView>,
}

impl Wire for TransactionResult {
    type View = TransactionResultView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(TransactionResultView {
            block_id: self.block_id.hex(),
            block_height: self.block_height,
            status: self.status.code(),
            status_string: self.status.name().to_owned(),
            error_message: self.error.clone().unwrap_or_default(),
            status_code: u8::from(self.is_failure()),
            events: self
                .events
                .iter()
                .map(|e| EventView::new(e, self.block_id, self.block_height))
                .collect::<Result<_>>()?,
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        let status = TransactionStatus::from_code(view.status)
            .ok_or_else(|| Error::Decode(format!("unknown transaction status {}", view.status)))?;
        let error = (!view.error_message.is_empty()).then_some(view.error_message);
        if view.status_code != u8::from(error.is_some()) {
            return Err(Error::Decode(format!(
                "status code {} disagrees with error message presence",
                view.status_code
            )));
        }
        Ok(Self {
            status,
            error,
            events: view
                .events
                .into_iter()
                .map(EventView::into_event)
                .collect::<Result<_>>()?,
            block_id: Identifier::from_hex(&view.block_id)?,
            block_height: view.block_height,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionGuaranteeView {
    pub collection_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSealView {
    pub block_id: String,
    pub execution_receipt_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub id: String,
    pub parent_id: String,
    pub height: u64,
    pub timestamp: String,
    #[serde(default)]
    pub collection_guarantees: Vec<CollectionGuaranteeView>,
    #[serde(default)]
    pub block_seals: Vec<BlockSealView>,
    /// Always empty; the engine does not sign blocks.
    #[serde(default)]
    pub signatures: Vec<String>,
}

impl Wire for Block {
    type View = BlockView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(BlockView {
            id: self.id.hex(),
            parent_id: self.parent_id.hex(),
            height: self.height,
            timestamp: timestamp(&self.timestamp),
            collection_guarantees: self
                .collection_guarantees
                .iter()
                .map(|g| CollectionGuaranteeView {
                    collection_id: g.collection_id.hex(),
                })
                .collect(),
            block_seals: self
                .seals
                .iter()
                .map(|s| BlockSealView {
                    block_id: s.block_id.hex(),
                    execution_receipt_id: s.execution_receipt_id.hex(),
                })
                .collect(),
            signatures: Vec::new(),
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        Ok(Self {
            id: Identifier::from_hex(&view.id)?,
            parent_id: Identifier::from_hex(&view.parent_id)?,
            height: view.height,
            timestamp: parse_timestamp(&view.timestamp)?,
            collection_guarantees: view
                .collection_guarantees
                .iter()
                .map(|g| {
                    Ok(CollectionGuarantee {
                        collection_id: Identifier::from_hex(&g.collection_id)?,
                    })
                })
                .collect::<Result<_>>()?,
            seals: view
                .block_seals
                .iter()
                .map(|s| {
                    Ok(BlockSeal {
                        block_id: Identifier::from_hex(&s.block_id)?,
                        execution_receipt_id: Identifier::from_hex(&s.execution_receipt_id)?,
                    })
                })
                .collect::<Result<_>>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    #[serde(default)]
    pub id: String,
    pub transaction_ids: Vec<String>,
}

impl Wire for Collection {
    type View = CollectionView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(CollectionView {
            id: self.id().hex(),
            transaction_ids: self.transaction_ids.iter().map(Identifier::hex).collect(),
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        Ok(Self {
            transaction_ids: view
                .transaction_ids
                .iter()
                .map(|id| Identifier::from_hex(id).map_err(Error::from))
                .collect::<Result<_>>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEventsView {
    pub block_id: String,
    pub height: u64,
    pub block_timestamp: String,
    #[serde(default)]
    pub events: Vec<EventView>,
}

impl Wire for BlockEvents {
    type View = BlockEventsView;

    fn to_view(&self) -> Result<Self::View> {
        Ok(BlockEventsView {
            block_id: self.block_id.hex(),
            height: self.height,
            block_timestamp: timestamp(&self.block_timestamp),
            events: self
                .events
                .iter()
                .map(|e| EventView::new(e, self.block_id, self.height))
                .collect::<Result<_>>()?,
        })
    }

    fn from_view(view: Self::View) -> Result<Self> {
        Ok(Self {
            block_id: Identifier::from_hex(&view.block_id)?,
            height: view.height,
            block_timestamp: parse_timestamp(&view.block_timestamp)?,
            events: view
                .events
                .into_iter()
                .map(EventView::into_event)
                .collect::<Result<_>>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParameters {
    pub chain_id: String,
}

impl NetworkParameters {
    #[must_use]
    pub fn emulator() -> Self {
        Self {
            chain_id: "flow-emulator".to_owned(),
        }
    }
}
