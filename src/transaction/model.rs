use std::collections::BTreeMap;

use chrono::Utc;
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::MINING_REWARD;
use crate::error::{LedgerError, Result};
use crate::util::verify_signature;
use crate::wallet::Wallet;

/// How a transaction proves where its value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionInput {
    /// Spend of the sender's whole balance, signed over the output map.
    Signed {
        timestamp: i64, // Unix millis (UTC)
        amount: u64,
        address: String,
        /// Hex-encoded DER ECDSA signature
        signature: String,
    },
    /// Mining reward; carries no signature.
    Reward,
}

impl TransactionInput {
    /// Sender address, `None` for rewards.
    pub fn address(&self) -> Option<&str> {
        match self {
            TransactionInput::Signed { address, .. } => Some(address),
            TransactionInput::Reward => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// Destination address -> amount, including the sender's change.
    pub output_map: BTreeMap<String, u64>,
    pub input: TransactionInput,
}

impl Transaction {
    /// Transfer `amount` from `sender` to `recipient`, returning the rest of
    /// the sender's balance to itself as change.
    pub fn new(sender: &Wallet, recipient: &str, amount: u64) -> Result<Self> {
        let change = sender
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::AmountExceedsBalance {
                requested: amount,
                available: sender.balance,
            })?;

        let mut output_map = BTreeMap::new();
        output_map.insert(recipient.to_string(), amount);
        output_map.insert(sender.public_key.clone(), change);

        let input = Self::signed_input(sender, sender.balance, &output_map)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            output_map,
            input,
        })
    }

    /// Reward transaction paying `MINING_REWARD` to `miner_address`.
    pub fn reward(miner_address: &str) -> Self {
        let mut output_map = BTreeMap::new();
        output_map.insert(miner_address.to_string(), MINING_REWARD);
        Self {
            id: Uuid::new_v4().to_string(),
            output_map,
            input: TransactionInput::Reward,
        }
    }

    pub fn is_reward(&self) -> bool {
        matches!(self.input, TransactionInput::Reward)
    }

    pub fn total_output_amount(&self) -> u128 {
        self.output_map.values().map(|a| *a as u128).sum()
    }

    /// The output map as the value that gets signed.
    pub fn signing_payload(output_map: &BTreeMap<String, u64>) -> Value {
        json!(output_map)
    }

    fn signed_input(
        sender: &Wallet,
        amount: u64,
        output_map: &BTreeMap<String, u64>,
    ) -> Result<TransactionInput> {
        Ok(TransactionInput::Signed {
            timestamp: Utc::now().timestamp_millis(),
            amount,
            address: sender.public_key.clone(),
            signature: sender.sign(&Self::signing_payload(output_map))?,
        })
    }

    /// Check that outputs add up to the input amount and that the input
    /// signature covers the output map.
    pub fn validate(&self) -> Result<()> {
        let TransactionInput::Signed {
            amount,
            address,
            signature,
            ..
        } = &self.input
        else {
            return Err(LedgerError::UnsignedReward);
        };

        let outputs = self.total_output_amount();
        if outputs != *amount as u128 {
            return Err(LedgerError::InvalidTransactionTotals {
                address: address.clone(),
                outputs,
                input: *amount,
            });
        }

        let payload = Self::signing_payload(&self.output_map);
        if !verify_signature(address, &payload, signature) {
            return Err(LedgerError::InvalidSignature {
                address: address.clone(),
            });
        }

        Ok(())
    }

    /// Same as [`Transaction::validate`], logging the reason on failure.
    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                error!("transaction {} rejected: {}", self.id, e);
                false
            }
        }
    }

    /// Add another payment from `sender` to this pending transaction.
    ///
    /// The amount comes out of the sender's change output and the input is
    /// re-signed, so totals keep matching the input amount.
    pub fn update(&mut self, sender: &Wallet, recipient: &str, amount: u64) -> Result<()> {
        let proven = match &self.input {
            TransactionInput::Signed {
                amount, address, ..
            } => {
                if *address != sender.public_key {
                    return Err(LedgerError::ForeignSender {
                        owner: address.clone(),
                        sender: sender.public_key.clone(),
                    });
                }
                *amount
            }
            TransactionInput::Reward => return Err(LedgerError::UnsignedReward),
        };

        let remaining = self
            .output_map
            .get(&sender.public_key)
            .copied()
            .unwrap_or(0);
        if amount > remaining {
            return Err(LedgerError::AmountExceedsBalance {
                requested: amount,
                available: remaining,
            });
        }

        *self.output_map.entry(recipient.to_string()).or_insert(0) += amount;
        if let Some(change) = self.output_map.get_mut(&sender.public_key) {
            *change -= amount;
        }

        self.input = Self::signed_input(sender, proven, &self.output_map)?;
        Ok(())
    }
}
