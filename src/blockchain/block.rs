use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_TIMESTAMP, INITIAL_DIFFICULTY, MINE_RATE};
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use crate::util::{crypto_hash, meets_difficulty};

/// One entry of a block's payload: a transaction, or any opaque JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Transaction(Transaction),
    Payload(Value),
}

impl From<Transaction> for BlockData {
    fn from(tx: Transaction) -> Self {
        BlockData::Transaction(tx)
    }
}

/// A mined block. Blocks are never mutated once mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: i64, // Unix millis (UTC)
    pub last_hash: String,
    pub hash: String,
    pub data: Vec<BlockData>,
    pub nonce: u64,      // Proof-of-Work nonce
    pub difficulty: u32, // leading zero bits required in `hash`
}

impl Block {
    /// The fixed first block of every chain.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: Vec::new(),
            nonce: 0,
            difficulty: INITIAL_DIFFICULTY,
        }
    }

    /// Content hash over all fields except `hash` itself.
    pub fn compute_hash(
        timestamp: i64,
        last_hash: &str,
        data: &[BlockData],
        nonce: u64,
        difficulty: u32,
    ) -> String {
        Self::hash_fields(timestamp, last_hash, &json!(data), nonce, difficulty)
    }

    /// Recompute the hash from this block's own fields.
    pub fn recompute_hash(&self) -> String {
        Self::compute_hash(
            self.timestamp,
            &self.last_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    fn hash_fields(
        timestamp: i64,
        last_hash: &str,
        data: &Value,
        nonce: u64,
        difficulty: u32,
    ) -> String {
        crypto_hash(&[
            json!(timestamp),
            json!(last_hash),
            data.clone(),
            json!(nonce),
            json!(difficulty),
        ])
    }

    /// Search for a nonce that makes a block on top of `last_block`
    /// satisfy its own difficulty. Blocks the caller until found.
    pub fn mine(last_block: &Block, data: Vec<BlockData>) -> Block {
        let encoded = json!(data);
        let mut nonce: u64 = 0;
        loop {
            nonce = nonce.wrapping_add(1);
            if let Some(block) = Self::attempt(last_block, &data, &encoded, nonce) {
                return block;
            }
        }
    }

    /// Same search as [`Block::mine`], giving up once `cancel` is raised or
    /// `deadline` has passed.
    pub fn mine_cancellable(
        last_block: &Block,
        data: Vec<BlockData>,
        cancel: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<Block> {
        let encoded = json!(data);
        let mut nonce: u64 = 0;
        loop {
            if cancel.load(Ordering::Relaxed) || deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(LedgerError::MiningCancelled);
            }
            nonce = nonce.wrapping_add(1);
            if let Some(block) = Self::attempt(last_block, &data, &encoded, nonce) {
                return Ok(block);
            }
        }
    }

    // Timestamp and difficulty are resampled on every attempt; only the
    // accepted tuple ends up in the block.
    fn attempt(
        last_block: &Block,
        data: &[BlockData],
        encoded: &Value,
        nonce: u64,
    ) -> Option<Block> {
        let timestamp = Utc::now().timestamp_millis();
        let difficulty = Self::adjust_difficulty(last_block, timestamp);
        let hash = Self::hash_fields(timestamp, &last_block.hash, encoded, nonce, difficulty);
        if !meets_difficulty(&hash, difficulty) {
            return None;
        }
        Some(Block {
            timestamp,
            last_hash: last_block.hash.clone(),
            hash,
            data: data.to_vec(),
            nonce,
            difficulty,
        })
    }

    /// One step up when the block came fast, one step down when it took
    /// longer than `MINE_RATE`. Never below 1 from a zero-difficulty parent.
    /// Parent timestamps come from peers, so the elapsed time saturates.
    pub fn adjust_difficulty(original: &Block, timestamp: i64) -> u32 {
        if original.difficulty < 1 {
            return 1;
        }
        if timestamp.saturating_sub(original.timestamp) > MINE_RATE {
            original.difficulty - 1
        } else {
            original.difficulty.saturating_add(1)
        }
    }

    /// Transactions carried in this block, skipping opaque payloads.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.data.iter().filter_map(|d| match d {
            BlockData::Transaction(tx) => Some(tx),
            BlockData::Payload(_) => None,
        })
    }
}
