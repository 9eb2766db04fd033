//! Algorithm codes expected by host client libraries.
//!
//! These are not the engine's enum ordinals. Hash and signature codes start at
//! 1 and follow the client transport's lookup tables.

use flowbridge_ledger::{HashAlgorithm, SignatureAlgorithm};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCode(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureCode(pub u8);

impl TryFrom<HashAlgorithm> for HashCode {
    type Error = Error;

    fn try_from(value: HashAlgorithm) -> Result<Self, Self::Error> {
        Ok(Self(match value {
            HashAlgorithm::Sha2_256 => 1,
            HashAlgorithm::Sha2_384 => 2,
            HashAlgorithm::Sha3_256 => 3,
            HashAlgorithm::Sha3_384 => 4,
            HashAlgorithm::Kmac128 => 5,
            HashAlgorithm::Unknown | HashAlgorithm::Keccak256 => {
                return Err(Error::Encoding(format!(
                    "hash algorithm {value} has no client code"
                )));
            }
        }))
    }
}

impl TryFrom<HashCode> for HashAlgorithm {
    type Error = Error;

    fn try_from(value: HashCode) -> Result<Self, Self::Error> {
        Ok(match value.0 {
            1 => Self::Sha2_256,
            2 => Self::Sha2_384,
            3 => Self::Sha3_256,
            4 => Self::Sha3_384,
            5 => Self::Kmac128,
            code => return Err(Error::Decode(format!("unknown hash algorithm code {code}"))),
        })
    }
}

impl TryFrom<SignatureAlgorithm> for SignatureCode {
    type Error = Error;

    fn try_from(value: SignatureAlgorithm) -> Result<Self, Self::Error> {
        Ok(Self(match value {
            SignatureAlgorithm::EcdsaP256 => 1,
            SignatureAlgorithm::EcdsaSecp256k1 => 2,
            SignatureAlgorithm::BlsBls12381 => 3,
            SignatureAlgorithm::Unknown => {
                return Err(Error::Encoding(format!(
                    "signature algorithm {value} has no client code"
                )));
            }
        }))
    }
}

impl TryFrom<SignatureCode> for SignatureAlgorithm {
    type Error = Error;

    fn try_from(value: SignatureCode) -> Result<Self, Self::Error> {
        Ok(match value.0 {
            1 => Self::EcdsaP256,
            2 => Self::EcdsaSecp256k1,
            3 => Self::BlsBls12381,
            code => {
                return Err(Error::Decode(format!(
                    "unknown signature algorithm code {code}"
                )));
            }
        })
    }
}
