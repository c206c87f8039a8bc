//! Chain keys: fixed-size digests of resolved policy chains, used only to
//! group entities that resolve to the same policies.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::error::DecorationError;
use crate::resolver::ResolvedChain;

/// Supported chain key digests, parsed case-insensitively by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, StrumDisplay, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
    Blake3,
}

/// Lowercase hex digest of a resolved chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainKey(String);

impl ChainKey {
    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChainKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// Computes chain keys with one selected algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDigest {
    algorithm: DigestAlgorithm,
}

impl Default for ChainDigest {
    fn default() -> Self {
        Self {
            algorithm: DigestAlgorithm::Sha256,
        }
    }
}

impl ChainDigest {
    /// Select a digest by name. Unknown names are `DigestUnavailable`.
    pub fn new(algorithm: &str) -> Result<Self, DecorationError> {
        let algorithm = DigestAlgorithm::from_str(algorithm)
            .map_err(|_| DecorationError::DigestUnavailable(algorithm.to_string()))?;
        Ok(Self { algorithm })
    }

    /// The selected algorithm.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Digest the chain's defined levels in chain order. Empty levels do not
    /// contribute.
    pub fn key(&self, chain: &ResolvedChain) -> ChainKey {
        let hex = match self.algorithm {
            DigestAlgorithm::Sha256 => hash_with::<Sha256>(chain),
            DigestAlgorithm::Sha512 => hash_with::<Sha512>(chain),
            DigestAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for level in chain.defined() {
                    hasher.update(level.as_bytes());
                }
                hasher.finalize().to_hex().to_string()
            }
        };
        ChainKey(hex)
    }
}

fn hash_with<D: Digest>(chain: &ResolvedChain) -> String {
    let mut hasher = D::new();
    for level in chain.defined() {
        hasher.update(level.as_bytes());
    }
    hex::encode(hasher.finalize())
}
