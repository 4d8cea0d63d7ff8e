//! Public identities for record owners and program namespaces.
//!
//! An `Identity` is an opaque 32-byte public key. The canonical string form
//! is base58, which is what appears in JSON, logs, and APIs. The core never
//! verifies signatures — wallets and the ledger do that — so this type is
//! purely an identifier.

use crate::error::{Error, Result};
use serde::de::Error as _;
use std::fmt;
use std::str::FromStr;

/// Byte length of a public identity.
pub const IDENTITY_LEN: usize = 32;

/// Opaque 32-byte public identity (owner or program namespace).
///
/// # String form
///
/// Base58 (e.g. `"coUnmi3oBUtwtd9fjeAvSsJssXh5A5xyPbhpewyzRVF"`). Used in
/// JSON, logs, and APIs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// Wrap raw identity bytes.
    pub fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the canonical base58 string form.
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::encoding(format!("invalid base58 identity: {e}")))?;
        let bytes: [u8; IDENTITY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            Error::encoding(format!(
                "identity must be {IDENTITY_LEN} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Derive a deterministic identity from arbitrary seed bytes.
    ///
    /// SHA2-256 of the seed. Tests and local tooling use this so they never
    /// need a real wallet keypair.
    pub fn from_seed(seed: &[u8]) -> Self {
        use sha2::Digest;
        Self(sha2::Sha256::digest(seed).into())
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base58(s)
    }
}

impl serde::Serialize for Identity {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> serde::Deserialize<'de> for Identity {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Identity::from_base58(&s).map_err(D::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            let bytes: [u8; IDENTITY_LEN] = bytes
                .try_into()
                .map_err(|_| D::Error::custom("identity must be 32 bytes"))?;
            Ok(Identity(bytes))
        }
    }
}
