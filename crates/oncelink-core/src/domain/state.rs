//! Grant state machine.

use serde::{Deserialize, Serialize};

/// Per-token state.
///
/// State transitions:
/// - Unviewed -> Consumed (exactly once, via `RecordStore::try_consume`)
/// - any -> absent (TTL expiry; not represented here, the record simply stops existing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantState {
    /// Created, not yet finalized. Any number of `begin_view` calls may observe it.
    Unviewed,

    /// Finalized. Never transitions back.
    Consumed,
}

impl GrantState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, GrantState::Consumed)
    }

    /// Can a viewer still be shown the media?
    pub fn is_viewable(self) -> bool {
        matches!(self, GrantState::Unviewed)
    }

    /// 永続化用の表現（serde と同じ綴り）
    pub fn as_str(self) -> &'static str {
        match self {
            GrantState::Unviewed => "UNVIEWED",
            GrantState::Consumed => "CONSUMED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "UNVIEWED" => Some(GrantState::Unviewed),
            "CONSUMED" => Some(GrantState::Consumed),
            _ => None,
        }
    }
}
