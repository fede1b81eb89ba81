//! Engine events.
//!
//! Every committed engine call appends its events to the engine's log under a
//! fresh block number; events of failed calls are discarded with the rest of
//! the call's effects.

use chrono::{DateTime, Utc};
use compoundor_domain::events::{CustodyEvent, EventCursor};
use compoundor_domain::math::X64;
use compoundor_domain::{AccountId, PositionId, TokenAmount, TokenId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEventKind {
    TokenDeposited {
        account: AccountId,
        position: PositionId,
    },
    TokenWithdrawn {
        account: AccountId,
        recipient: AccountId,
        position: PositionId,
    },
    AutoCompounded {
        caller: AccountId,
        position: PositionId,
        token0: TokenId,
        token1: TokenId,
        compounded0: TokenAmount,
        compounded1: TokenAmount,
        bonus0: TokenAmount,
        bonus1: TokenAmount,
        protocol_fee0: TokenAmount,
        protocol_fee1: TokenAmount,
    },
    BalanceWithdrawn {
        account: AccountId,
        token: TokenId,
        recipient: AccountId,
        amount: TokenAmount,
    },
    BonusUpdated {
        version: u64,
        total_bonus_x64: X64,
        compounder_bonus_x64: X64,
    },
    TwapConfigUpdated {
        version: u64,
        max_tick_difference: u32,
        window_seconds: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub cursor: EventCursor,
    pub timestamp: DateTime<Utc>,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    /// The custody change carried by this event, if any.
    pub fn custody_event(&self) -> Option<CustodyEvent> {
        match self.kind {
            EngineEventKind::TokenDeposited { account, position } => {
                Some(CustodyEvent::deposited(self.cursor, position, account))
            }
            EngineEventKind::TokenWithdrawn {
                account, position, ..
            } => Some(CustodyEvent::withdrawn(self.cursor, position, account)),
            _ => None,
        }
    }
}

/// Append-only event log with block and log index assignment.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog {
    events: Vec<EngineEvent>,
    block_number: u64,
    log_index: u64,
}

impl EventLog {
    /// Opens the block for the next transaction.
    pub(crate) fn begin_block(&mut self) {
        self.block_number += 1;
        self.log_index = 0;
    }

    pub(crate) fn push(&mut self, kind: EngineEventKind) {
        let cursor = EventCursor::new(self.block_number, self.log_index);
        self.log_index += 1;
        self.events.push(EngineEvent {
            cursor,
            timestamp: Utc::now(),
            kind,
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn since(&self, start: usize) -> &[EngineEvent] {
        self.events.get(start..).unwrap_or_default()
    }

    pub(crate) fn all(&self) -> &[EngineEvent] {
        &self.events
    }

    pub(crate) fn block_number(&self) -> u64 {
        self.block_number
    }

    /// An empty log positioned where this one is. Stands in for the log in
    /// engine snapshots, which never need the history.
    pub(crate) fn detached(&self) -> Self {
        Self {
            events: Vec::new(),
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }

    pub(crate) fn checkpoint(&self) -> LogCheckpoint {
        LogCheckpoint {
            len: self.events.len(),
            block_number: self.block_number,
            log_index: self.log_index,
        }
    }

    /// Drops every event pushed after `checkpoint` and reopens its block.
    pub(crate) fn rollback(&mut self, checkpoint: LogCheckpoint) {
        self.events.truncate(checkpoint.len);
        self.block_number = checkpoint.block_number;
        self.log_index = checkpoint.log_index;
    }
}

/// Position of an [`EventLog`] before a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LogCheckpoint {
    len: usize,
    block_number: u64,
    log_index: u64,
}

impl LogCheckpoint {
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
