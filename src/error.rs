use thiserror::Error;

/// Reasons a transaction, block or candidate chain gets rejected.
///
/// Only `AmountExceedsBalance` is surfaced as a failure of the requesting
/// operation; every other kind is reported and turned into a negative
/// validity result by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("amount {requested} exceeds balance {available}")]
    AmountExceedsBalance { requested: u64, available: u64 },

    #[error("invalid signature from {address}")]
    InvalidSignature { address: String },

    #[error("invalid transaction from {address}: outputs total {outputs}, input amount {input}")]
    InvalidTransactionTotals {
        address: String,
        outputs: u128,
        input: u64,
    },

    #[error("transaction from {owner} cannot be amended by {sender}")]
    ForeignSender { owner: String, sender: String },

    #[error("reward transaction cannot be validated as a signed transfer")]
    UnsignedReward,

    #[error("chain does not start with the genesis block")]
    InvalidGenesis,

    #[error("block #{index} does not reference its predecessor's hash")]
    InvalidChainLinkage { index: usize },

    #[error("block #{index} hash does not match its contents")]
    InvalidBlockHash { index: usize },

    #[error("block #{index} difficulty dropped from {previous} to {current}")]
    InvalidDifficultyJump {
        index: usize,
        previous: u32,
        current: u32,
    },

    #[error("block #{index} contains more than one reward transaction")]
    DuplicateReward { index: usize },

    #[error("block #{index} reward outputs total {amount}, expected a single output of the mining reward")]
    InvalidRewardAmount { index: usize, amount: u128 },

    #[error("block #{index}: input amount {claimed} from {address} does not match balance {actual}")]
    InvalidInputBalance {
        index: usize,
        address: String,
        claimed: u64,
        actual: u64,
    },

    #[error("block #{index} contains transaction {id} more than once")]
    DuplicateTransactionInBlock { index: usize, id: String },

    #[error("incoming chain of length {candidate} is not longer than local chain of length {local}")]
    ChainNotLonger { candidate: usize, local: usize },

    #[error("mining was cancelled before a valid nonce was found")]
    MiningCancelled,

    #[error("crypto error: {0}")]
    Crypto(&'static str),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
