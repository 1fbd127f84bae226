//! Core domain types for the fxcarry trading bot.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `Proposal`, `ProposalSide`: The untrusted strategy proposal
//! - `AccountSnapshot`, `Position`: Account state owned by the coordinator
//! - `OrderIntent`, `OrderOutcome`, `IdempotencyKey`: Execution types
//! - `Decision`, `LockState`: Authorization output of the safety interlock

pub mod account;
pub mod decimal;
pub mod decision;
pub mod error;
pub mod market;
pub mod order;
pub mod proposal;
pub mod time;

pub use account::{AccountSnapshot, Position, PositionId, SnapshotId};
pub use decimal::{Price, Size};
pub use decision::{Decision, LockState};
pub use error::{CoreError, Result};
pub use market::MarketQuote;
pub use order::{IdempotencyKey, OrderAction, OrderIntent, OrderOutcome, OrderSide};
pub use proposal::{Proposal, ProposalSide};
pub use time::{Clock, SystemClock};
