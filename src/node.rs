use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::blockchain::{Block, BlockData, Blockchain};
use crate::config::NodeConfig;
use crate::error::Result;
use crate::transaction::{Transaction, TransactionPool};
use crate::wallet::{Wallet, calculate_balance};

/// Outbound side of the peer transport.
pub trait Broadcaster: Send + Sync {
    fn broadcast_chain(&self, chain: &[Block]);
    fn broadcast_transaction(&self, tx: &Transaction);
}

/// Broadcaster for a node without peers: it only logs what would be sent.
#[derive(Debug, Default)]
pub struct LogBroadcaster;

impl Broadcaster for LogBroadcaster {
    fn broadcast_chain(&self, chain: &[Block]) {
        debug!("broadcast chain (length {})", chain.len());
    }

    fn broadcast_transaction(&self, tx: &Transaction) {
        debug!("broadcast transaction {}", tx.id);
    }
}

/// Shared node state: the chain, the pool and the node's own wallet.
///
/// Locks are always taken in the order chain, pool, wallet. Mining holds
/// the chain lock for the whole nonce search, so every method that reads the
/// chain stalls until the search ends; async callers must go through a
/// blocking pool.
pub struct Node {
    blockchain: Mutex<Blockchain>,
    pool: Mutex<TransactionPool>,
    wallet: Mutex<Wallet>,
    broadcaster: Box<dyn Broadcaster>,
    mining_timeout: Option<Duration>,
    cancel_mining: AtomicBool,
}

impl Default for Node {
    fn default() -> Self {
        Self::new(&NodeConfig::default(), Box::new(LogBroadcaster))
    }
}

impl Node {
    pub fn new(config: &NodeConfig, broadcaster: Box<dyn Broadcaster>) -> Self {
        Self {
            blockchain: Mutex::new(Blockchain::new()),
            pool: Mutex::new(TransactionPool::new()),
            wallet: Mutex::new(Wallet::new()),
            broadcaster,
            mining_timeout: config.mining_timeout,
            cancel_mining: AtomicBool::new(false),
        }
    }

    pub fn get_chain(&self) -> Vec<Block> {
        self.blockchain.lock().expect("mutex poisoned").chain.clone()
    }

    pub fn is_valid(&self) -> bool {
        let bc = self.blockchain.lock().expect("mutex poisoned");
        Blockchain::is_valid_chain(&bc.chain)
    }

    /// Abort the mining search currently running, if any.
    pub fn cancel_mining(&self) {
        self.cancel_mining.store(true, Ordering::Relaxed);
    }

    // Mines on the locked chain and returns the new block with its index;
    // the flag is reset per search.
    fn mine_onto(&self, bc: &mut Blockchain, data: Vec<BlockData>) -> Result<(usize, Block)> {
        self.cancel_mining.store(false, Ordering::Relaxed);
        let deadline = self.mining_timeout.map(|t| Instant::now() + t);
        let block = bc
            .add_block_cancellable(data, &self.cancel_mining, deadline)?
            .clone();
        let index = bc.len() - 1;
        info!(
            "mined block #{} (hash={}, nonce={}, difficulty={})",
            index, block.hash, block.nonce, block.difficulty
        );
        Ok((index, block))
    }

    /// Mine `data` into a new block and broadcast the chain. Returns the
    /// block together with its position in the chain it was mined into.
    pub fn add_block(&self, data: Vec<BlockData>) -> Result<(usize, Block)> {
        let (mined, chain) = {
            let mut bc = self.blockchain.lock().expect("mutex poisoned");
            let mined = self.mine_onto(&mut bc, data)?;
            (mined, bc.chain.clone())
        };
        self.broadcaster.broadcast_chain(&chain);
        Ok(mined)
    }

    /// Pay `amount` to `recipient` from the node's wallet.
    pub fn submit_transaction(&self, recipient: &str, amount: u64) -> Result<Transaction> {
        let tx = {
            let bc = self.blockchain.lock().expect("mutex poisoned");
            let mut pool = self.pool.lock().expect("mutex poisoned");
            let mut wallet = self.wallet.lock().expect("mutex poisoned");
            Self::stage_transaction(&bc, &mut pool, &mut wallet, recipient, amount)?
        };
        self.broadcaster.broadcast_transaction(&tx);
        Ok(tx)
    }

    /// Pay `amount` to `recipient` from an external `sender` wallet.
    pub fn submit_transaction_from(
        &self,
        sender: &mut Wallet,
        recipient: &str,
        amount: u64,
    ) -> Result<Transaction> {
        let tx = {
            let bc = self.blockchain.lock().expect("mutex poisoned");
            let mut pool = self.pool.lock().expect("mutex poisoned");
            Self::stage_transaction(&bc, &mut pool, sender, recipient, amount)?
        };
        self.broadcaster.broadcast_transaction(&tx);
        Ok(tx)
    }

    // Amend the sender's pending transaction if there is one, otherwise
    // create a fresh one against the current chain.
    fn stage_transaction(
        bc: &Blockchain,
        pool: &mut TransactionPool,
        sender: &mut Wallet,
        recipient: &str,
        amount: u64,
    ) -> Result<Transaction> {
        let tx = match pool.existing_transaction(&sender.public_key).cloned() {
            Some(mut pending) => {
                pending.update(sender, recipient, amount)?;
                debug!("amended pending transaction {}", pending.id);
                pending
            }
            None => sender.create_transaction(recipient, amount, Some(&bc.chain))?,
        };
        pool.set(tx.clone());
        Ok(tx)
    }

    pub fn pool_snapshot(&self) -> Vec<Transaction> {
        self.pool
            .lock()
            .expect("mutex poisoned")
            .transactions()
            .to_vec()
    }

    /// Mine every valid pending transaction plus a reward for this node,
    /// then drop the committed entries from the pool.
    pub fn mine_transactions(&self) -> Result<(usize, Block)> {
        let (mined, chain) = {
            let mut bc = self.blockchain.lock().expect("mutex poisoned");

            let mut data: Vec<BlockData> = {
                let pool = self.pool.lock().expect("mutex poisoned");
                pool.valid_transactions()
                    .into_iter()
                    .map(BlockData::from)
                    .collect()
            };
            let miner = self.wallet.lock().expect("mutex poisoned").public_key.clone();
            data.push(Transaction::reward(&miner).into());
            debug!("mining {} transactions (reward included)", data.len());

            let mined = self.mine_onto(&mut bc, data)?;
            self.pool
                .lock()
                .expect("mutex poisoned")
                .clear_blockchain_transactions(&bc.chain);
            (mined, bc.chain.clone())
        };
        self.broadcaster.broadcast_chain(&chain);
        Ok(mined)
    }

    /// Run the replace-chain rule against a chain received from a peer.
    /// Adoption and pool clean-up happen under the chain lock.
    pub fn receive_candidate_chain(&self, candidate: Vec<Block>) -> Result<()> {
        let mut bc = self.blockchain.lock().expect("mutex poisoned");
        bc.replace_chain(candidate, true, |adopted| {
            self.pool
                .lock()
                .expect("mutex poisoned")
                .clear_blockchain_transactions(adopted);
        })
    }

    /// Admit a transaction received from a peer.
    pub fn receive_transaction(&self, tx: Transaction) -> Result<()> {
        if let Err(e) = tx.validate() {
            warn!("refusing transaction {} from peer: {e}", tx.id);
            return Err(e);
        }
        self.pool.lock().expect("mutex poisoned").set(tx);
        Ok(())
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        let bc = self.blockchain.lock().expect("mutex poisoned");
        calculate_balance(&bc.chain, address)
    }

    /// The node wallet's address and its balance on the current chain.
    pub fn wallet_info(&self) -> (String, u64) {
        let bc = self.blockchain.lock().expect("mutex poisoned");
        let wallet = self.wallet.lock().expect("mutex poisoned");
        let balance = calculate_balance(&bc.chain, &wallet.public_key);
        (wallet.public_key.clone(), balance)
    }

    pub fn chain_len(&self) -> usize {
        self.blockchain.lock().expect("mutex poisoned").len()
    }

    pub fn difficulty(&self) -> u32 {
        self.blockchain.lock().expect("mutex poisoned").difficulty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::transaction::{MINING_REWARD, TransactionInput};
    use crate::wallet::STARTING_BALANCE;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingBroadcaster {
        chains: Arc<AtomicUsize>,
        transactions: Arc<AtomicUsize>,
    }

    impl Broadcaster for CountingBroadcaster {
        fn broadcast_chain(&self, _chain: &[Block]) {
            self.chains.fetch_add(1, Ordering::SeqCst);
        }

        fn broadcast_transaction(&self, _tx: &Transaction) {
            self.transactions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_node() -> (Node, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let b = CountingBroadcaster::default();
        let (chains, txs) = (b.chains.clone(), b.transactions.clone());
        (Node::new(&NodeConfig::default(), Box::new(b)), chains, txs)
    }

    #[test]
    fn add_block_mines_and_broadcasts() {
        let (node, chains, _) = counting_node();
        let (index, block) = node.add_block(vec![BlockData::Payload(json!("foo"))]).unwrap();

        assert_eq!(index, 1);
        assert_eq!(node.chain_len(), 2);
        assert_eq!(node.get_chain()[1], block);
        assert_eq!(chains.load(Ordering::SeqCst), 1);
        assert!(node.is_valid());
    }

    #[test]
    fn submit_amends_existing_pending_transaction() {
        let (node, _, txs) = counting_node();
        let first = node.submit_transaction("alice", 10).unwrap();
        let second = node.submit_transaction("bob", 20).unwrap();

        assert_eq!(first.id, second.id);
        let pool = node.pool_snapshot();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].output_map["alice"], 10);
        assert_eq!(pool[0].output_map["bob"], 20);
        assert!(pool[0].is_valid());
        assert_eq!(txs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn submit_surfaces_amount_exceeds_balance() {
        let node = Node::default();
        let err = node
            .submit_transaction("alice", STARTING_BALANCE + 1)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AmountExceedsBalance { .. }));
        assert!(node.pool_snapshot().is_empty());
    }

    #[test]
    fn submit_from_external_wallet() {
        let node = Node::default();
        let mut sender = Wallet::new();
        let tx = node.submit_transaction_from(&mut sender, "carol", 5).unwrap();
        assert_eq!(tx.input.address(), Some(sender.public_key.as_str()));
        assert_eq!(node.pool_snapshot(), vec![tx]);
    }

    #[test]
    fn mine_transactions_commits_pool_and_pays_reward() {
        let (node, chains, _) = counting_node();
        let tx = node.submit_transaction("alice", 100).unwrap();
        let (index, block) = node.mine_transactions().unwrap();

        assert_eq!(index, 1);
        let mined: Vec<_> = block.transactions().collect();
        assert_eq!(mined.len(), 2);
        assert_eq!(mined[0], &tx);
        assert!(mined[1].is_reward());
        assert!(node.pool_snapshot().is_empty());
        assert_eq!(chains.load(Ordering::SeqCst), 1);

        let (address, balance) = node.wallet_info();
        assert_eq!(balance, STARTING_BALANCE - 100 + MINING_REWARD);
        assert_eq!(node.balance_of("alice"), STARTING_BALANCE + 100);
        assert_eq!(node.balance_of(&address), balance);
    }

    #[test]
    fn mine_transactions_skips_invalid_pool_entries() {
        let node = Node::default();
        let mut tampered = Transaction::new(&Wallet::new(), "x", 5).unwrap();
        if let TransactionInput::Signed { amount, .. } = &mut tampered.input {
            *amount = 1;
        }
        node.pool.lock().unwrap().set(tampered.clone());

        let (_, block) = node.mine_transactions().unwrap();
        assert_eq!(block.transactions().count(), 1);
        // not committed, so it stays pending
        assert_eq!(node.pool_snapshot(), vec![tampered]);
    }

    #[test]
    fn receive_candidate_chain_adopts_and_cleans_pool() {
        let source = Node::default();
        let tx = source.submit_transaction("dave", 40).unwrap();
        source.mine_transactions().unwrap();

        let sink = Node::default();
        sink.receive_transaction(tx.clone()).unwrap();
        let unrelated = sink.submit_transaction("erin", 1).unwrap();

        sink.receive_candidate_chain(source.get_chain()).unwrap();
        assert_eq!(sink.get_chain(), source.get_chain());
        assert_eq!(sink.pool_snapshot(), vec![unrelated]);
    }

    #[test]
    fn receive_candidate_chain_rejects_shorter_or_invalid() {
        let node = Node::default();
        node.add_block(vec![BlockData::Payload(json!("local"))]).unwrap();
        let before = node.get_chain();

        let err = node.receive_candidate_chain(vec![Block::genesis()]).unwrap_err();
        assert!(matches!(err, LedgerError::ChainNotLonger { .. }));

        let peer = Node::default();
        peer.add_block(vec![BlockData::Payload(json!("a"))]).unwrap();
        peer.add_block(vec![BlockData::Payload(json!("b"))]).unwrap();
        let mut forged = peer.get_chain();
        forged[2].data = vec![BlockData::Payload(json!("evil"))];
        assert!(node.receive_candidate_chain(forged).is_err());

        assert_eq!(node.get_chain(), before);
    }

    #[test]
    fn receive_transaction_refuses_invalid_and_rewards() {
        let node = Node::default();
        assert_eq!(
            node.receive_transaction(Transaction::reward("miner")),
            Err(LedgerError::UnsignedReward)
        );

        let mut tampered = Transaction::new(&Wallet::new(), "x", 5).unwrap();
        tampered.output_map.insert("x".into(), 6);
        assert!(node.receive_transaction(tampered).is_err());
        assert!(node.pool_snapshot().is_empty());
    }

    #[test]
    fn cancelled_mining_leaves_chain_untouched() {
        let config = NodeConfig {
            mining_timeout: Some(Duration::ZERO),
            ..NodeConfig::default()
        };
        let node = Node::new(&config, Box::new(LogBroadcaster));
        let err = node
            .add_block(vec![BlockData::Payload(json!("never"))])
            .unwrap_err();
        assert_eq!(err, LedgerError::MiningCancelled);
        assert_eq!(node.chain_len(), 1);
    }

    #[test]
    fn mined_index_tracks_chain_position() {
        let node = Node::default();
        for expected in 1..=3 {
            let (index, block) = node
                .add_block(vec![BlockData::Payload(json!(expected))])
                .unwrap();
            assert_eq!(index, expected);
            assert_eq!(node.get_chain()[index], block);
        }
    }

    #[test]
    fn mining_onto_adopted_extreme_timestamps_keeps_node_alive() {
        let genesis = Block::genesis();
        for timestamp in [i64::MIN, i64::MAX] {
            let data = vec![BlockData::Payload(json!("peer"))];
            let difficulty = 2;
            let head = Block {
                timestamp,
                last_hash: genesis.hash.clone(),
                hash: Block::compute_hash(timestamp, &genesis.hash, &data, 0, difficulty),
                data,
                nonce: 0,
                difficulty,
            };
            let config = NodeConfig {
                mining_timeout: Some(Duration::from_secs(30)),
                ..NodeConfig::default()
            };
            let node = Node::new(&config, Box::new(LogBroadcaster));
            node.receive_candidate_chain(vec![genesis.clone(), head.clone()])
                .unwrap();

            let (index, block) = node
                .add_block(vec![BlockData::Payload(json!("local"))])
                .unwrap();
            assert_eq!(index, 2);
            assert_eq!(block.last_hash, head.hash);
            let expected = if timestamp == i64::MIN { 1 } else { 3 };
            assert_eq!(block.difficulty, expected);
            assert_eq!(node.chain_len(), 3);
            assert_eq!(node.get_chain()[2], block);
        }
    }
}
