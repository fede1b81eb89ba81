//! Safety controls for the keeper.
//!
//! Positions that keep failing are backed off individually so one bad pool
//! cannot stall or spam the whole cycle.

mod circuit_breaker;

pub use circuit_breaker::*;
