//! Domain model (token, record, state, outcomes, errors).

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod record;
pub mod state;

pub use self::errors::{ErrorKind, GrantError, ObjectStoreError, StoreError};
pub use self::ids::{MediaRef, Token};
pub use self::outcome::{ConsumeOutcome, FinalizeOutcome, ViewOutcome};
pub use self::record::TokenRecord;
pub use self::state::GrantState;
