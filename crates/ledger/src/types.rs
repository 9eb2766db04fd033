use std::{borrow::Cow, collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Invalid(#[from] hex::FromHexError),
    #[error("hex value too long: expected at most {max} bytes, got {got}")]
    TooLong { max: usize, got: usize },
}

/// Decodes `s` into a fixed-size big-endian buffer, left-padding short input
/// with zeros. An optional `0x` prefix is accepted.
fn decode_padded<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s: Cow<'_, str> = if s.len() % 2 == 1 {
        Cow::Owned(format!("0{s}"))
    } else {
        Cow::Borrowed(s)
    };
    let bytes = hex::decode(s.as_ref())?;
    if bytes.len() > N {
        return Err(HexError::TooLong {
            max: N,
            got: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

macro_rules! hex_newtype {
    ($name:ident, $len:literal) => {
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// # Errors
            /// Returns an error if `s` is not hex or encodes more than
            /// [`Self::LEN`] bytes.
            pub fn from_hex(s: &str) -> Result<Self, HexError> {
                decode_padded::<$len>(s).map(Self)
            }

            #[must_use]
            pub fn hex(&self) -> String {
                hex::encode(self.0)
            }

            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            #[must_use]
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.hex())
            }
        }

        impl FromStr for $name {
            type Err = HexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }
    };
}

hex_newtype!(Address, 8);
hex_newtype!(Identifier, 32);

impl Address {
    /// Service account of the emulator chain.
    pub const EMULATOR_SERVICE: Self = Self([0xf8, 0xd6, 0xe0, 0x58, 0x6b, 0x0a, 0x20, 0xc7]);

    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    #[must_use]
    pub const fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.0)
    }
}

impl Identifier {
    fn digest(f: impl FnOnce(&mut CanonicalHasher)) -> Self {
        let mut hasher = CanonicalHasher(Sha256::new());
        f(&mut hasher);
        Self(hasher.0.finalize().into())
    }
}

/// Length-prefixed field writer so that distinct field sequences never hash
/// to the same byte stream.
struct CanonicalHasher(Sha256);

impl CanonicalHasher {
    fn bytes(&mut self, data: &[u8]) {
        self.0.update((data.len() as u64).to_be_bytes());
        self.0.update(data);
    }

    fn u64(&mut self, value: u64) {
        self.0.update(value.to_be_bytes());
    }

    fn tag(&mut self, tag: &str) {
        self.bytes(tag.as_bytes());
    }
}

/// Signature algorithms as numbered by the engine.
///
/// The discriminants are the engine's own ordinals; the codes expected by
/// host client libraries are a separate table owned by the bridge codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SignatureAlgorithm {
    #[default]
    Unknown = 0,
    BlsBls12381 = 1,
    EcdsaP256 = 2,
    EcdsaSecp256k1 = 3,
}

impl SignatureAlgorithm {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::BlsBls12381 => "BLS_BLS12_381",
            Self::EcdsaP256 => "ECDSA_P256",
            Self::EcdsaSecp256k1 => "ECDSA_secp256k1",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hash algorithms as numbered by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HashAlgorithm {
    #[default]
    Unknown = 0,
    Sha2_256 = 1,
    Sha2_384 = 2,
    Sha3_256 = 3,
    Sha3_384 = 4,
    Keccak256 = 5,
    Kmac128 = 6,
}

impl HashAlgorithm {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Sha2_256 => "SHA2_256",
            Self::Sha2_384 => "SHA2_384",
            Self::Sha3_256 => "SHA3_256",
            Self::Sha3_384 => "SHA3_384",
            Self::Keccak256 => "Keccak_256",
            Self::Kmac128 => "KMAC128",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountKey {
    pub index: u32,
    pub public_key: Vec<u8>,
    pub sig_algo: SignatureAlgorithm,
    pub hash_algo: HashAlgorithm,
    pub weight: u32,
    pub sequence_number: u64,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub address: Address,
    pub balance: u64,
    pub code: Vec<u8>,
    pub contracts: BTreeMap<String, Vec<u8>>,
    pub keys: Vec<AccountKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProposalKey {
    pub address: Address,
    pub key_index: u32,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSignature {
    pub address: Address,
    pub key_index: u32,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    pub script: Vec<u8>,
    /// Pre-encoded argument values, one entry per argument.
    pub arguments: Vec<Vec<u8>>,
    pub reference_block_id: Identifier,
    pub gas_limit: u64,
    pub proposal_key: ProposalKey,
    pub payer: Address,
    pub authorizers: Vec<Address>,
    pub payload_signatures: Vec<TransactionSignature>,
    pub envelope_signatures: Vec<TransactionSignature>,
}

impl Transaction {
    /// Canonical transaction identifier.
    #[must_use]
    pub fn id(&self) -> Identifier {
        Identifier::digest(|h| {
            h.tag("transaction");
            h.bytes(&self.script);
            h.u64(self.arguments.len() as u64);
            for arg in &self.arguments {
                h.bytes(arg);
            }
            h.bytes(self.reference_block_id.as_bytes());
            h.u64(self.gas_limit);
            h.bytes(self.proposal_key.address.as_bytes());
            h.u64(u64::from(self.proposal_key.key_index));
            h.u64(self.proposal_key.sequence_number);
            h.bytes(self.payer.as_bytes());
            h.u64(self.authorizers.len() as u64);
            for authorizer in &self.authorizers {
                h.bytes(authorizer.as_bytes());
            }
            for signatures in [&self.payload_signatures, &self.envelope_signatures] {
                h.u64(signatures.len() as u64);
                for sig in signatures {
                    h.bytes(sig.address.as_bytes());
                    h.u64(u64::from(sig.key_index));
                    h.bytes(&sig.signature);
                }
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum TransactionStatus {
    #[default]
    Unknown = 0,
    Pending = 1,
    Finalized = 2,
    Executed = 3,
    Sealed = 4,
    Expired = 5,
}

impl TransactionStatus {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Unknown,
            1 => Self::Pending,
            2 => Self::Finalized,
            3 => Self::Executed,
            4 => Self::Sealed,
            5 => Self::Expired,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Pending => "PENDING",
            Self::Finalized => "FINALIZED",
            Self::Executed => "EXECUTED",
            Self::Sealed => "SEALED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: String,
    pub transaction_id: Identifier,
    pub transaction_index: u32,
    pub event_index: u32,
    /// Encoded event value.
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionResult {
    pub status: TransactionStatus,
    pub error: Option<String>,
    pub events: Vec<Event>,
    pub block_id: Identifier,
    pub block_height: u64,
}

impl TransactionResult {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionGuarantee {
    pub collection_id: Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSeal {
    pub block_id: Identifier,
    pub execution_receipt_id: Identifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: Identifier,
    pub parent_id: Identifier,
    pub height: u64,
    pub timestamp: DateTime<Utc>,
    pub collection_guarantees: Vec<CollectionGuarantee>,
    pub seals: Vec<BlockSeal>,
}

impl Block {
    /// Builds a block whose id is derived from its header fields.
    #[must_use]
    pub fn seal(
        parent_id: Identifier,
        height: u64,
        timestamp: DateTime<Utc>,
        collection_guarantees: Vec<CollectionGuarantee>,
        seals: Vec<BlockSeal>,
    ) -> Self {
        let id = Identifier::digest(|h| {
            h.tag("block");
            h.bytes(parent_id.as_bytes());
            h.u64(height);
            h.bytes(timestamp.to_rfc3339().as_bytes());
            h.u64(collection_guarantees.len() as u64);
            for guarantee in &collection_guarantees {
                h.bytes(guarantee.collection_id.as_bytes());
            }
            h.u64(seals.len() as u64);
            for seal in &seals {
                h.bytes(seal.block_id.as_bytes());
                h.bytes(seal.execution_receipt_id.as_bytes());
            }
        });
        Self {
            id,
            parent_id,
            height,
            timestamp,
            collection_guarantees,
            seals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Collection {
    pub transaction_ids: Vec<Identifier>,
}

impl Collection {
    #[must_use]
    pub fn id(&self) -> Identifier {
        Identifier::digest(|h| {
            h.tag("collection");
            h.u64(self.transaction_ids.len() as u64);
            for id in &self.transaction_ids {
                h.bytes(id.as_bytes());
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvents {
    pub block_id: Identifier,
    pub height: u64,
    pub block_timestamp: DateTime<Utc>,
    pub events: Vec<Event>,
}
