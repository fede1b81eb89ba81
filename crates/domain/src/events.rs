//! Custody events as seen by off-chain consumers.
//!
//! Events are ordered by `(block_number, log_index)`, which is unique per
//! event and stable across replays.

use crate::ids::{AccountId, PositionId};
use serde::{Deserialize, Serialize};

/// Position in the event log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventCursor {
    pub block_number: u64,
    pub log_index: u64,
}

impl EventCursor {
    pub fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustodyEventKind {
    Deposited,
    Withdrawn,
}

/// A position entering or leaving custody.
///
/// Sorting orders events by their cursor first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustodyEvent {
    pub cursor: EventCursor,
    pub kind: CustodyEventKind,
    pub position: PositionId,
    pub account: AccountId,
}

impl CustodyEvent {
    pub fn deposited(cursor: EventCursor, position: PositionId, account: AccountId) -> Self {
        Self {
            cursor,
            kind: CustodyEventKind::Deposited,
            position,
            account,
        }
    }

    pub fn withdrawn(cursor: EventCursor, position: PositionId, account: AccountId) -> Self {
        Self {
            cursor,
            kind: CustodyEventKind::Withdrawn,
            position,
            account,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_sort_by_block_then_log_index() {
        let owner = AccountId::repeat_byte(1);
        let mut events = vec![
            CustodyEvent::withdrawn(EventCursor::new(5, 0), PositionId::from(1), owner),
            CustodyEvent::deposited(EventCursor::new(3, 7), PositionId::from(1), owner),
            CustodyEvent::deposited(EventCursor::new(5, 1), PositionId::from(2), owner),
        ];
        events.sort();
        let cursors: Vec<_> = events.iter().map(|e| e.cursor).collect();
        assert_eq!(
            cursors,
            vec![
                EventCursor::new(3, 7),
                EventCursor::new(5, 0),
                EventCursor::new(5, 1)
            ]
        );
    }
}
