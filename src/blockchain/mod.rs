pub mod block;
pub mod model;

pub use block::{Block, BlockData};
pub use model::Blockchain;

/// Target milliseconds between blocks; slower blocks lower the difficulty.
pub const MINE_RATE: i64 = 1000;

/// Difficulty recorded in the genesis block (leading zero bits).
pub const INITIAL_DIFFICULTY: u32 = 3;

/// Fixed genesis fields. The genesis block is never mined.
pub const GENESIS_TIMESTAMP: i64 = 1;
pub const GENESIS_LAST_HASH: &str = "-----";
pub const GENESIS_HASH: &str = "hash-one";
