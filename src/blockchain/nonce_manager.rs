// src/blockchain/nonce_manager.rs

use std::sync::Arc;

use dashmap::DashMap;
use ethers::types::Address;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes nonce lookup, signing and broadcast per sender and chain.
///
/// The pending nonce is always read fresh from the node while the lane is
/// held, so a failed broadcast never leaves a gap.
#[derive(Debug, Clone, Default)]
pub struct NonceManager {
    lanes: Arc<DashMap<(u64, Address), Arc<Mutex<()>>>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other submission from `sender` on `chain_id` is in flight.
    pub async fn lock(&self, chain_id: u64, sender: Address) -> OwnedMutexGuard<()> {
        let lane = self
            .lanes
            .entry((chain_id, sender))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lane.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn same_sender_same_chain_is_serialized() {
        let manager = NonceManager::new();
        let sender = Address::repeat_byte(0x11);
        let guard = manager.lock(1, sender).await;

        let contender = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let _g = manager.lock(1, sender).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!contender.is_finished());

        // Other chains are independent.
        let _other = manager.lock(137, sender).await;

        drop(guard);
        contender.await.unwrap();
    }
}
