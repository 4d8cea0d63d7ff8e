//! Deterministic storage addresses for journal entries.
//!
//! A record's address is derived from its logical key — `(owner, title)` —
//! plus the owning program's namespace identity. Any client holding those
//! inputs can recompute where the record lives; there are no server-issued
//! identifiers. This determinism is the load-bearing invariant of the whole
//! system: changing the derivation orphans every existing record.

use crate::error::{Error, Result};
use crate::identity::Identity;
use serde::de::Error as _;
use sha2::Digest;
use std::fmt;
use std::str::FromStr;

/// Maximum byte length of a single derivation seed (the UTF-8 title).
///
/// Matches the seed cap enforced by the ledger runtime; a longer title can
/// never address an on-ledger account, so derivation fails before any I/O.
pub const MAX_SEED_LEN: usize = 32;

/// Domain-separation tag appended to the seed digest.
///
/// Keeps derived addresses disjoint from raw identities and from any other
/// digest of the same seed bytes.
const ADDRESS_DOMAIN_TAG: &[u8] = b"JournalDerivedAddress";

/// Byte length of a derived storage address.
pub const ADDRESS_LEN: usize = 32;

/// Opaque fixed-size storage address, derived deterministically from
/// `(owner, title, program namespace)`.
///
/// Same string/serde treatment as [`Identity`]: base58 in human-readable
/// forms, raw bytes in binary ones.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageAddress([u8; ADDRESS_LEN]);

impl StorageAddress {
    /// Wrap raw address bytes (e.g. parsed from an external listing).
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the canonical base58 string form.
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::encoding(format!("invalid base58 address: {e}")))?;
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            Error::encoding(format!(
                "address must be {ADDRESS_LEN} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

/// Derive the storage address of a journal entry.
///
/// Seeds are `[title_utf8, owner_bytes]`, followed by the program namespace
/// and a fixed domain tag — the same logical inputs the on-ledger program
/// uses to locate the entry account.
///
/// Pure and deterministic: byte-identical output across repeated calls and
/// across processes. The only failure is `Error::Encoding` when the title
/// exceeds [`MAX_SEED_LEN`] bytes in UTF-8.
pub fn derive_entry_address(
    owner: &Identity,
    title: &str,
    program: &Identity,
) -> Result<StorageAddress> {
    if title.len() > MAX_SEED_LEN {
        return Err(Error::encoding(format!(
            "title seed exceeds {MAX_SEED_LEN} bytes: got {} bytes",
            title.len()
        )));
    }

    let mut hasher = sha2::Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(owner.as_bytes());
    hasher.update(program.as_bytes());
    hasher.update(ADDRESS_DOMAIN_TAG);
    Ok(StorageAddress(hasher.finalize().into()))
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageAddress({self})")
    }
}

impl FromStr for StorageAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base58(s)
    }
}

impl serde::Serialize for StorageAddress {
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

impl<'de> serde::Deserialize<'de> for StorageAddress {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            StorageAddress::from_base58(&s).map_err(D::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            let bytes: [u8; ADDRESS_LEN] = bytes
                .try_into()
                .map_err(|_| D::Error::custom("address must be 32 bytes"))?;
            Ok(StorageAddress(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Identity {
        Identity::from_seed(b"owner")
    }

    fn program() -> Identity {
        Identity::from_seed(b"program")
    }

    #[test]
    fn test_derivation_deterministic() {
        let a = derive_entry_address(&owner(), "my first entry", &program()).unwrap();
        let b = derive_entry_address(&owner(), "my first entry", &program()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_titles_distinct_addresses() {
        let a = derive_entry_address(&owner(), "title-a", &program()).unwrap();
        let b = derive_entry_address(&owner(), "title-b", &program()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_owners_distinct_addresses() {
        let other = Identity::from_seed(b"other-owner");
        let a = derive_entry_address(&owner(), "shared title", &program()).unwrap();
        let b = derive_entry_address(&other, "shared title", &program()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_programs_distinct_addresses() {
        let other = Identity::from_seed(b"other-program");
        let a = derive_entry_address(&owner(), "t", &program()).unwrap();
        let b = derive_entry_address(&owner(), "t", &other).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_title_at_seed_cap_ok() {
        let title = "x".repeat(MAX_SEED_LEN);
        assert!(derive_entry_address(&owner(), &title, &program()).is_ok());
    }

    #[test]
    fn test_title_over_seed_cap_fails_encoding() {
        let title = "x".repeat(MAX_SEED_LEN + 1);
        let err = derive_entry_address(&owner(), &title, &program()).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_multibyte_title_measured_in_bytes() {
        // 11 chars, 33 bytes in UTF-8 — over the cap.
        let title = "ééééééééééé".repeat(3);
        assert!(title.len() > MAX_SEED_LEN);
        assert!(derive_entry_address(&owner(), &title, &program()).is_err());
    }

    #[test]
    fn test_address_disjoint_from_identity_digest() {
        // Same bytes hashed without the domain tag must not collide with a
        // derived address.
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.update("t".as_bytes());
        hasher.update(owner().as_bytes());
        hasher.update(program().as_bytes());
        let untagged: [u8; 32] = hasher.finalize().into();

        let derived = derive_entry_address(&owner(), "t", &program()).unwrap();
        assert_ne!(derived.as_bytes(), &untagged);
    }

    #[test]
    fn test_string_roundtrip() {
        let addr = derive_entry_address(&owner(), "roundtrip", &program()).unwrap();
        let parsed: StorageAddress = addr.to_string().parse().unwrap();
        assert_eq!(addr, parsed);
    }
}
