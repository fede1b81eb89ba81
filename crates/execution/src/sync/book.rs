//! The keeper's view of custodied positions.
//!
//! Live pushes and historical replay feed the same fold, [`PositionBook::apply`].
//! The fold remembers the cursor of the last event it applied per position,
//! withdrawn positions included, and ignores anything at or before it, so
//! duplicate and stale deliveries are no-ops.

use chrono::{DateTime, Utc};
use compoundor_domain::events::{CustodyEvent, CustodyEventKind, EventCursor};
use compoundor_domain::{AccountId, PositionId};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

/// Result of the last profitability check of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub checked_at: DateTime<Utc>,
    /// Quoted bonus value in whole reference tokens. Zero right after a compound.
    pub gain: Decimal,
    /// Gas units the call was estimated at; the cost baseline.
    pub gas_units: u64,
    /// Gain accrued per second, known once two checks were observed.
    pub gain_per_sec: Option<Decimal>,
}

impl Observation {
    /// First observation of a position.
    pub fn first(checked_at: DateTime<Utc>, gain: Decimal, gas_units: u64) -> Self {
        Self {
            checked_at,
            gain,
            gas_units,
            gain_per_sec: None,
        }
    }

    /// Follow-up observation that did not compound.
    ///
    /// The rate is the gain delta over the elapsed time. It never goes
    /// negative: a falling quote means prices moved, not that fees were
    /// taken away.
    pub fn next(&self, checked_at: DateTime<Utc>, gain: Decimal, gas_units: u64) -> Self {
        let elapsed_ms = (checked_at - self.checked_at).num_milliseconds();
        let gain_per_sec = if elapsed_ms > 0 {
            let rate = (gain - self.gain) * Decimal::from(1_000) / Decimal::from(elapsed_ms);
            Some(rate.max(Decimal::ZERO))
        } else {
            self.gain_per_sec
        };
        Self {
            checked_at,
            gain,
            gas_units,
            gain_per_sec,
        }
    }

    /// Observation after a compound: the gain restarts at zero and the rate
    /// carries over.
    pub fn compounded(&self, checked_at: DateTime<Utc>, gas_units: u64) -> Self {
        Self {
            checked_at,
            gain: Decimal::ZERO,
            gas_units,
            gain_per_sec: self.gain_per_sec,
        }
    }

    /// Gain expected at `now`, extrapolated from the last observation.
    pub fn estimated_gain(&self, now: DateTime<Utc>) -> Decimal {
        let elapsed_ms = (now - self.checked_at).num_milliseconds().max(0);
        let accrued = self
            .gain_per_sec
            .map_or(Decimal::ZERO, |rate| rate * Decimal::from(elapsed_ms) / Decimal::from(1_000));
        self.gain + accrued
    }
}

/// A custodied position the keeper watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPosition {
    pub position: PositionId,
    pub owner: AccountId,
    /// Cursor of the deposit that started tracking.
    pub deposited_at: EventCursor,
    pub observation: Option<Observation>,
}

/// Outcome of folding one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Tracked,
    Untracked,
    /// Duplicate or stale event.
    Ignored,
}

/// Tracked positions plus the per-position fold cursors.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    tracked: HashMap<PositionId, TrackedPosition>,
    cursors: HashMap<PositionId, EventCursor>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a book by folding `history` in (block, log index) order.
    pub fn from_history(mut history: Vec<CustodyEvent>) -> Self {
        history.sort();
        let mut book = Self::new();
        for event in &history {
            book.apply(event);
        }
        book
    }

    /// Folds one custody event into the book.
    pub fn apply(&mut self, event: &CustodyEvent) -> FoldOutcome {
        if let Some(seen) = self.cursors.get(&event.position) {
            if event.cursor <= *seen {
                debug!(position = %event.position, cursor = ?event.cursor, "Ignoring stale custody event");
                return FoldOutcome::Ignored;
            }
        }
        self.cursors.insert(event.position, event.cursor);

        match event.kind {
            CustodyEventKind::Deposited => {
                self.tracked.insert(
                    event.position,
                    TrackedPosition {
                        position: event.position,
                        owner: event.account,
                        deposited_at: event.cursor,
                        observation: None,
                    },
                );
                debug!(position = %event.position, owner = ?event.account, "Tracking position");
                FoldOutcome::Tracked
            }
            CustodyEventKind::Withdrawn => {
                self.tracked.remove(&event.position);
                debug!(position = %event.position, "Untracking position");
                FoldOutcome::Untracked
            }
        }
    }

    pub fn get(&self, position: PositionId) -> Option<&TrackedPosition> {
        self.tracked.get(&position)
    }

    pub fn contains(&self, position: PositionId) -> bool {
        self.tracked.contains_key(&position)
    }

    /// Replaces the observation of a tracked position. Returns false if the
    /// position is no longer tracked.
    pub fn set_observation(&mut self, position: PositionId, observation: Option<Observation>) -> bool {
        match self.tracked.get_mut(&position) {
            Some(tracked) => {
                tracked.observation = observation;
                true
            }
            None => false,
        }
    }

    /// Tracked positions, ordered by id.
    pub fn positions(&self) -> Vec<TrackedPosition> {
        let mut positions: Vec<_> = self.tracked.values().cloned().collect();
        positions.sort_by_key(|tracked| tracked.position);
        positions
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn owner() -> AccountId {
        AccountId::from_low_u64_be(1)
    }

    fn deposit(block: u64, position: u64) -> CustodyEvent {
        CustodyEvent::deposited(EventCursor::new(block, 0), PositionId::from(position), owner())
    }

    fn withdraw(block: u64, position: u64) -> CustodyEvent {
        CustodyEvent::withdrawn(EventCursor::new(block, 0), PositionId::from(position), owner())
    }

    #[test]
    fn test_fold_tracks_and_untracks() {
        let mut book = PositionBook::new();
        assert_eq!(book.apply(&deposit(1, 10)), FoldOutcome::Tracked);
        assert_eq!(book.apply(&deposit(2, 11)), FoldOutcome::Tracked);
        assert_eq!(book.apply(&withdraw(3, 10)), FoldOutcome::Untracked);

        assert!(!book.contains(PositionId::from(10)));
        assert!(book.contains(PositionId::from(11)));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_duplicates_and_stale_events_are_ignored() {
        let mut book = PositionBook::new();
        book.apply(&deposit(1, 10));
        book.apply(&withdraw(2, 10));

        // Redelivered deposit must not resurrect the position.
        assert_eq!(book.apply(&deposit(1, 10)), FoldOutcome::Ignored);
        assert_eq!(book.apply(&withdraw(2, 10)), FoldOutcome::Ignored);
        assert!(book.is_empty());

        // A later re-deposit is new.
        assert_eq!(book.apply(&deposit(5, 10)), FoldOutcome::Tracked);
        assert_eq!(book.get(PositionId::from(10)).unwrap().deposited_at, EventCursor::new(5, 0));
    }

    #[test]
    fn test_from_history_orders_events() {
        let history = vec![withdraw(3, 10), deposit(4, 12), deposit(1, 10), deposit(2, 11)];
        let book = PositionBook::from_history(history);
        let ids: Vec<_> = book.positions().iter().map(|t| t.position).collect();
        assert_eq!(ids, vec![PositionId::from(11), PositionId::from(12)]);
    }

    #[test]
    fn test_observation_rate() {
        let start = Utc::now();
        let first = Observation::first(start, dec!(1), 200_000);
        assert_eq!(first.gain_per_sec, None);
        assert_eq!(first.estimated_gain(start + chrono::Duration::seconds(100)), dec!(1));

        let second = first.next(start + chrono::Duration::seconds(10), dec!(3), 200_000);
        assert_eq!(second.gain_per_sec, Some(dec!(0.2)));
        assert_eq!(
            second.estimated_gain(start + chrono::Duration::seconds(20)),
            dec!(5)
        );

        // Falling quotes clamp the rate at zero.
        let third = second.next(start + chrono::Duration::seconds(20), dec!(2), 200_000);
        assert_eq!(third.gain_per_sec, Some(Decimal::ZERO));

        let reset = second.compounded(start + chrono::Duration::seconds(30), 210_000);
        assert_eq!(reset.gain, Decimal::ZERO);
        assert_eq!(reset.gain_per_sec, Some(dec!(0.2)));
        assert_eq!(reset.gas_units, 210_000);
    }
}
