pub mod model;
pub mod pool;

pub use model::{Transaction, TransactionInput};
pub use pool::TransactionPool;

/// Amount minted to the miner of every block.
pub const MINING_REWARD: u64 = 50;
