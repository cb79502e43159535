//! Outcomes of store and lifecycle operations.
//!
//! These are expected results, not failures: a missing or already-used token is
//! the normal end of a grant's life.

use super::{MediaRef, TokenRecord};

/// Result of the store's atomic conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// This caller won the Unviewed -> Consumed transition.
    Consumed(TokenRecord),
    /// The record exists (within TTL) but someone else consumed it first.
    AlreadyConsumed,
    /// Never existed, expired, or already reclaimed.
    NotFound,
}

/// Result of `LifecycleManager::begin_view`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOutcome {
    Viewable(MediaRef),
    /// Absent, TTL-expired and consumed all collapse into this.
    Expired,
}

/// Result of `LifecycleManager::finalize_view`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Only ever returned to one caller per token.
    Finalized,
    AlreadyExpired,
}

impl From<ConsumeOutcome> for FinalizeOutcome {
    fn from(outcome: ConsumeOutcome) -> Self {
        match outcome {
            ConsumeOutcome::Consumed(_) => FinalizeOutcome::Finalized,
            ConsumeOutcome::AlreadyConsumed | ConsumeOutcome::NotFound => {
                FinalizeOutcome::AlreadyExpired
            }
        }
    }
}
