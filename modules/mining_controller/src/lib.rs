//! Mining session controller for a Fleet Credits daemon.
//!
//! The daemon does the proof-of-work; this crate decides when to ask for it,
//! interprets what comes back and keeps score across attempts:
//! - [`MiningController::mine_once`]: one generation call with optional before/after stats.
//! - [`MiningController::auto_mine`]: repeated attempts until a block limit or cancellation.
//! - [`MiningController::status`]: chain, network and wallet summary.
//! - [`Verifier`]: preflight checks that never abort halfway.

mod controller;
mod report;
mod verifier;

pub use controller::*;
pub use report::COIN_TICKER;
pub use verifier::*;

pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests;
