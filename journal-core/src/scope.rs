//! Network scopes and per-scope program namespaces.
//!
//! Every query and mutation is issued under a scope (the network/cluster the
//! ledger lives on). The scope is an explicit parameter threaded through
//! every call — there is no ambient "current cluster" singleton — and it
//! selects the deployed program's namespace identity used for address
//! derivation.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Program id on devnet and testnet.
const DEVNET_TESTNET_PROGRAM_ID: &str = "coUnmi3oBUtwtd9fjeAvSsJssXh5A5xyPbhpewyzRVF";

/// Program id everywhere else (mainnet and local deployments).
const DEPLOYED_PROGRAM_ID: &str = "CwKNi9ne1Cv4pXWjz9mX7qJSiqXRN7ekLacDpPTgqTyH";

/// Network scope under which queries and mutations are issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Local validator
    Localnet,
    /// Public devnet
    Devnet,
    /// Public testnet
    Testnet,
    /// Mainnet
    Mainnet,
}

impl Scope {
    /// The record-store program's namespace identity on this scope.
    ///
    /// Devnet and testnet share one deployment; mainnet and local
    /// deployments use the id the program was published under.
    pub fn program_namespace(&self) -> Identity {
        let encoded = match self {
            Scope::Devnet | Scope::Testnet => DEVNET_TESTNET_PROGRAM_ID,
            Scope::Localnet | Scope::Mainnet => DEPLOYED_PROGRAM_ID,
        };
        // Both constants are verified 32-byte base58 strings (see tests).
        Identity::from_base58(encoded).expect("program id constant is a valid 32-byte base58 key")
    }

    /// Short name used in logs and cache-key debug output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Localnet => "localnet",
            Scope::Devnet => "devnet",
            Scope::Testnet => "testnet",
            Scope::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
