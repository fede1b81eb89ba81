//! Reconciliation of the position book against the engine's custody history.

use super::book::PositionBook;
use crate::client::CompoundorClient;
use crate::error::KeeperResult;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Result of a reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Positions found in history but missing from the live book.
    pub added: usize,
    /// Positions in the live book that history says were withdrawn.
    pub removed: usize,
    /// Positions present in both, observations kept.
    pub retained: usize,
    /// Events replayed.
    pub replayed: usize,
}

/// Rebuilds the book from history and merges it with the live one.
pub struct Reconciler<C: ?Sized> {
    client: Arc<C>,
}

impl<C: CompoundorClient + ?Sized> Reconciler<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Replays the full custody history into a fresh book and swaps it in.
    ///
    /// Observations survive for positions whose deposit is unchanged; a
    /// position that was withdrawn and deposited again starts over.
    pub async fn reconcile(&self, book: &RwLock<PositionBook>) -> KeeperResult<ReconcileResult> {
        let history = self.client.custody_history().await?;
        let replayed = history.len();
        let rebuilt = PositionBook::from_history(history);

        let mut live = book.write().await;
        let (merged, result) = merge(&live, rebuilt, replayed);
        *live = merged;

        info!(
            added = result.added,
            removed = result.removed,
            retained = result.retained,
            replayed,
            "Reconciled tracked positions"
        );
        Ok(result)
    }
}

fn merge(live: &PositionBook, mut rebuilt: PositionBook, replayed: usize) -> (PositionBook, ReconcileResult) {
    let mut result = ReconcileResult {
        replayed,
        ..ReconcileResult::default()
    };

    for tracked in rebuilt.positions() {
        match live.get(tracked.position) {
            Some(previous) if previous.deposited_at == tracked.deposited_at => {
                rebuilt.set_observation(tracked.position, previous.observation);
                result.retained += 1;
            }
            _ => result.added += 1,
        }
    }
    result.removed = live
        .positions()
        .iter()
        .filter(|tracked| match rebuilt.get(tracked.position) {
            Some(current) => current.deposited_at != tracked.deposited_at,
            None => true,
        })
        .count();

    (rebuilt, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::book::Observation;
    use chrono::Utc;
    use compoundor_domain::events::{CustodyEvent, EventCursor};
    use compoundor_domain::{AccountId, PositionId};
    use rust_decimal_macros::dec;

    fn owner() -> AccountId {
        AccountId::from_low_u64_be(1)
    }

    #[test]
    fn test_merge_keeps_observations_of_unchanged_deposits() {
        let d10 = CustodyEvent::deposited(EventCursor::new(1, 0), PositionId::from(10), owner());
        let d11 = CustodyEvent::deposited(EventCursor::new(2, 0), PositionId::from(11), owner());
        let w11 = CustodyEvent::withdrawn(EventCursor::new(3, 0), PositionId::from(11), owner());
        let d12 = CustodyEvent::deposited(EventCursor::new(4, 0), PositionId::from(12), owner());

        let mut live = PositionBook::from_history(vec![d10, d11]);
        let observation = Observation::first(Utc::now(), dec!(0.5), 180_000);
        live.set_observation(PositionId::from(10), Some(observation));

        let rebuilt = PositionBook::from_history(vec![d12, w11, d11, d10]);
        let (merged, result) = merge(&live, rebuilt, 4);

        assert_eq!(
            result,
            ReconcileResult {
                added: 1,
                removed: 1,
                retained: 1,
                replayed: 4
            }
        );
        assert_eq!(merged.get(PositionId::from(10)).unwrap().observation, Some(observation));
        assert!(merged.get(PositionId::from(12)).unwrap().observation.is_none());
        assert!(!merged.contains(PositionId::from(11)));
    }

    #[test]
    fn test_redeposit_drops_observation() {
        let d10 = CustodyEvent::deposited(EventCursor::new(1, 0), PositionId::from(10), owner());
        let w10 = CustodyEvent::withdrawn(EventCursor::new(2, 0), PositionId::from(10), owner());
        let again = CustodyEvent::deposited(EventCursor::new(3, 0), PositionId::from(10), owner());

        let mut live = PositionBook::from_history(vec![d10]);
        live.set_observation(PositionId::from(10), Some(Observation::first(Utc::now(), dec!(1), 1)));

        let (merged, result) = merge(&live, PositionBook::from_history(vec![d10, w10, again]), 3);
        assert!(merged.get(PositionId::from(10)).unwrap().observation.is_none());
        assert_eq!(result.added, 1);
        assert_eq!(result.removed, 1);
    }
}
