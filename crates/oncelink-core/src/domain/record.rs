//! Token record: the persisted grant.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{GrantState, MediaRef, Token};

/// Persisted layout: `{token, mediaRef, state, createdAt}`.
///
/// Design:
/// - `token`, `media_ref`, `created_at` are fixed at creation.
/// - `state` is only changed by the store's atomic consume step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub token: Token,
    pub media_ref: MediaRef,
    pub state: GrantState,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(token: Token, media_ref: MediaRef, created_at: DateTime<Utc>) -> Self {
        Self {
            token,
            media_ref,
            state: GrantState::Unviewed,
            created_at,
        }
    }

    /// Instant after which the record is treated as absent.
    ///
    /// `None` when `created_at + ttl` is not representable (effectively never).
    pub fn expires_at(&self, ttl: TimeDelta) -> Option<DateTime<Utc>> {
        self.created_at.checked_add_signed(ttl)
    }

    /// Expired at exactly `created_at + ttl` and any time after.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        match self.expires_at(ttl) {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Unviewed -> Consumed. Returns false if the record was already consumed.
    pub(crate) fn mark_consumed(&mut self) -> bool {
        if self.state.is_viewable() {
            self.state = GrantState::Consumed;
            true
        } else {
            false
        }
    }
}
