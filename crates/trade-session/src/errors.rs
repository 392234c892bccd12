//! Error taxonomy for the session core.
//!
//! Two families, per the dispatch contract: [`UserError`] is classified and
//! surfaced to the caller as an ack payload; [`InternalError`] means a
//! precondition the dispatch gate was supposed to guarantee didn't hold, and
//! is logged rather than described to the caller.

use thiserror::Error;

/// Errors the caller can act on; these cross the wire as `{errorName,
/// errorMessage}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    #[error("action is not valid while in state {state}")]
    InvalidAction { state: String },

    #[error("authentication failed")]
    Auth,

    #[error("a user may not invite themselves")]
    SelfInvite,

    #[error("no matching invite exists")]
    InvalidInvite,

    #[error("proposed inventory does not match the current inventory")]
    InventoryMismatch,

    #[error("both sides must lock in before a trade can complete")]
    CantCompleteEitherUnlocked,

    #[error("this user is already authenticated on another connection")]
    UserAlreadyAuthenticated,
}

impl UserError {
    /// The wire `errorName` surfaced in the action ack.
    pub fn error_name(&self) -> &'static str {
        match self {
            UserError::InvalidAction { .. } => "InvalidActionError",
            UserError::Auth => "AuthError",
            UserError::SelfInvite => "SelfInviteError",
            UserError::InvalidInvite => "InvalidInviteError",
            UserError::InventoryMismatch => "InventoryMismatchError",
            UserError::CantCompleteEitherUnlocked => "CantCompleteEitherUnlockedError",
            UserError::UserAlreadyAuthenticated => "UserAlreadyAuthenticatedError",
        }
    }
}

/// A manager precondition was violated that the dispatch gate should have
/// already ruled out (e.g. `sendInvite` called with an outbound invite
/// already set). Never shown to the caller in detail; the connection stays
/// open and the event is dropped.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("precondition violated: {0}")]
    Precondition(String),
}

/// Result type returned by manager operations: either family of error may
/// surface, and the dispatch loop distinguishes them when forming the ack.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

pub type ManagerResult<T> = std::result::Result<T, ManagerError>;
