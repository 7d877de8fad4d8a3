pub mod balance;

use rand::rngs::OsRng;
use secp256k1::{Secp256k1, SecretKey};
use serde_json::Value;

pub use balance::calculate_balance;

use crate::blockchain::Block;
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use crate::util::sign_data;

/// Balance assumed for an address with no sending history on the chain.
pub const STARTING_BALANCE: u64 = 1000;

/// A secp256k1 keypair plus the balance last derived for it.
///
/// The address is the hex of the compressed public key.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub balance: u64,
    pub public_key: String,
    secret_key: SecretKey,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    pub fn new() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            balance: STARTING_BALANCE,
            public_key: hex::encode(public_key.serialize()),
            secret_key,
        }
    }

    /// Hex DER signature over the content digest of `data`.
    pub fn sign(&self, data: &Value) -> Result<String> {
        sign_data(&self.secret_key, data)
    }

    /// Build a transfer to `recipient`. When `chain` is given the wallet's
    /// balance is first re-derived from it.
    pub fn create_transaction(
        &mut self,
        recipient: &str,
        amount: u64,
        chain: Option<&[Block]>,
    ) -> Result<Transaction> {
        if let Some(chain) = chain {
            self.balance = calculate_balance(chain, &self.public_key);
        }

        if amount > self.balance {
            return Err(LedgerError::AmountExceedsBalance {
                requested: amount,
                available: self.balance,
            });
        }

        Transaction::new(self, recipient, amount)
    }
}

/// Fresh keypair as (secret key hex, address). Nothing is kept server side.
pub fn generate_keypair_hex() -> (String, String) {
    let wallet = Wallet::new();
    (hex::encode(wallet.secret_key.secret_bytes()), wallet.public_key)
}
