pub mod crypto;

pub use crypto::{crypto_hash, hex_to_binary, meets_difficulty, sign_data, verify_signature};
