use crate::blockchain::Block;

use super::STARTING_BALANCE;

/// Balance of `address` derived from `chain`.
///
/// Walks blocks newest first, summing every output paid to `address`. The
/// walk stops after the most recent block in which `address` sent a
/// transaction, since that transaction's change output already carries the
/// balance up to that point. Addresses that never sent start from
/// `STARTING_BALANCE`.
pub fn calculate_balance(chain: &[Block], address: &str) -> u64 {
    let mut has_conducted_transaction = false;
    let mut outputs_total: u64 = 0;

    for block in chain.iter().rev() {
        for tx in block.transactions() {
            if tx.input.address() == Some(address) {
                has_conducted_transaction = true;
            }
            if let Some(amount) = tx.output_map.get(address) {
                outputs_total = outputs_total.saturating_add(*amount);
            }
        }
        if has_conducted_transaction {
            break;
        }
    }

    if has_conducted_transaction {
        outputs_total
    } else {
        outputs_total.saturating_add(STARTING_BALANCE)
    }
}
