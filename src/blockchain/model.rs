use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use log::{error, info};

use super::{Block, BlockData};
use crate::error::{LedgerError, Result};
use crate::transaction::{MINING_REWARD, TransactionInput};
use crate::wallet::calculate_balance;

/// In-memory chain of proof-of-work blocks, always starting at genesis.
#[derive(Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Initialize a new blockchain with a genesis block.
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    /// Mine and append a new block with the provided `data`.
    pub fn add_block(&mut self, data: Vec<BlockData>) -> &Block {
        let block = Block::mine(self.last_block(), data);
        self.chain.push(block);
        self.last_block()
    }

    /// Like [`Blockchain::add_block`], but the search can be abandoned.
    pub fn add_block_cancellable(
        &mut self,
        data: Vec<BlockData>,
        cancel: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<&Block> {
        let block = Block::mine_cancellable(self.last_block(), data, cancel, deadline)?;
        self.chain.push(block);
        Ok(self.last_block())
    }

    /// Structural check of `chain`: genesis, linkage, hash integrity and the
    /// bounded difficulty drop. Transactions are not inspected.
    pub fn validate_chain(chain: &[Block]) -> Result<()> {
        match chain.first() {
            Some(first) if *first == Block::genesis() => {}
            _ => return Err(LedgerError::InvalidGenesis),
        }

        for (index, pair) in chain.windows(2).enumerate() {
            let (prev, current) = (&pair[0], &pair[1]);
            let index = index + 1;

            if current.last_hash != prev.hash {
                return Err(LedgerError::InvalidChainLinkage { index });
            }

            if current.hash != current.recompute_hash() {
                return Err(LedgerError::InvalidBlockHash { index });
            }

            // A rise of any size is accepted; only drops are bounded.
            if i64::from(prev.difficulty) - i64::from(current.difficulty) > 1 {
                return Err(LedgerError::InvalidDifficultyJump {
                    index,
                    previous: prev.difficulty,
                    current: current.difficulty,
                });
            }
        }

        Ok(())
    }

    pub fn is_valid_chain(chain: &[Block]) -> bool {
        Self::validate_chain(chain).is_ok()
    }

    /// Transaction-level check of `chain`.
    ///
    /// Input balances are recomputed against this node's current chain, not
    /// against the candidate's own history.
    pub fn validate_transaction_data(&self, chain: &[Block]) -> Result<()> {
        for (index, block) in chain.iter().enumerate().skip(1) {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut rewards = 0usize;

            for tx in block.transactions() {
                match &tx.input {
                    TransactionInput::Reward => {
                        rewards += 1;
                        if rewards > 1 {
                            return Err(LedgerError::DuplicateReward { index });
                        }
                        let amount = tx.total_output_amount();
                        if tx.output_map.len() != 1 || amount != MINING_REWARD as u128 {
                            return Err(LedgerError::InvalidRewardAmount { index, amount });
                        }
                    }
                    TransactionInput::Signed {
                        amount, address, ..
                    } => {
                        tx.validate()?;

                        let actual = calculate_balance(&self.chain, address);
                        if *amount != actual {
                            return Err(LedgerError::InvalidInputBalance {
                                index,
                                address: address.clone(),
                                claimed: *amount,
                                actual,
                            });
                        }

                        if !seen.insert(tx.id.as_str()) {
                            return Err(LedgerError::DuplicateTransactionInBlock {
                                index,
                                id: tx.id.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    pub fn valid_transaction_data(&self, chain: &[Block]) -> bool {
        match self.validate_transaction_data(chain) {
            Ok(()) => true,
            Err(e) => {
                error!("invalid transaction data: {e}");
                false
            }
        }
    }

    /// Adopt `candidate` if it is strictly longer and valid.
    ///
    /// `on_success` runs with the adopted chain right before the swap. On any
    /// rejection the local chain is left untouched.
    pub fn replace_chain<F>(
        &mut self,
        candidate: Vec<Block>,
        validate_transactions: bool,
        on_success: F,
    ) -> Result<()>
    where
        F: FnOnce(&[Block]),
    {
        if candidate.len() <= self.chain.len() {
            let e = LedgerError::ChainNotLonger {
                candidate: candidate.len(),
                local: self.chain.len(),
            };
            error!("the incoming chain must be longer: {e}");
            return Err(e);
        }

        if let Err(e) = Self::validate_chain(&candidate) {
            error!("the incoming chain must be valid: {e}");
            return Err(e);
        }

        if validate_transactions {
            if let Err(e) = self.validate_transaction_data(&candidate) {
                error!("the incoming chain has invalid transaction data: {e}");
                return Err(e);
            }
        }

        on_success(&candidate);
        info!(
            "replacing chain: length {} -> {}, head {}",
            self.chain.len(),
            candidate.len(),
            candidate.last().map(|b| b.hash.as_str()).unwrap_or_default()
        );
        self.chain = candidate;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Difficulty of the current head.
    pub fn difficulty(&self) -> u32 {
        self.last_block().difficulty
    }
}
