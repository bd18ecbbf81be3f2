use std::collections::HashSet;

use chrono::Utc;
use ledgerchain_core::{Block, LedgerResult};
use ledgerchain_core::constants::GENESIS_PREVIOUS_HASH;
use ledgerchain_core::merkle::empty_root_hex;

use crate::db::StateStore;
use crate::rows::recomputed_block_hash;

/// The in-memory state a startup reload (or auto-recovery pass) hands
/// back to the chain engine: the reconstructed chain, in `block_number`
/// order, and the replay set seeded from every transaction hash on
/// record.
pub struct ReloadedState {
    pub chain: Vec<Block>,
    pub replay_hashes: HashSet<String>,
}

/// Build a genesis block: `block_number = 0`, `previous_hash = "0"`,
/// empty transaction set, `difficulty = 0` (genesis is exempt from
/// proof-of-work), and no mining step.
pub fn synthesize_genesis() -> Block {
    let mut block = Block {
        block_number: 0,
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        merkle_root: empty_root_hex(),
        timestamp: Utc::now(),
        nonce: 0,
        difficulty: 0,
        validator_user_id: None,
        validator_public_key: None,
        validator_signature: None,
        transactions: Vec::new(),
        hash: String::new(),
    };
    block.hash = recomputed_block_hash(&block);
    block
}

impl StateStore {
    /// Read every block back in order, reconstruct the chain, and seed a
    /// replay set from every stored transaction hash. If the store is
    /// empty, synthesize and persist a genesis block first.
    pub async fn reload_or_bootstrap(&self) -> LedgerResult<ReloadedState> {
        if self.count_blocks().await? == 0 {
            let genesis = synthesize_genesis();
            self.put_sealed_block(&genesis, None).await?;
        }

        let chain = self.iter_all_blocks().await?;
        let replay_hashes: HashSet<String> = self.all_transaction_hashes().await?.into_iter().collect();
        Ok(ReloadedState { chain, replay_hashes })
    }
}
