//! Tracking of custodied positions.
//!
//! Provides the keeper's position set via:
//! - An idempotent fold over deposit and withdrawal events
//! - Reconciliation by replaying the custody history
//! - A live subscription that reconnects and reconciles

mod book;
mod listener;
mod reconciler;

pub use book::*;
pub use listener::*;
pub use reconciler::*;
