use formflow_contract::{CheckpointError, CollaboratorError, Phase, StoreError};
use formflow_state::PatchError;
use thiserror::Error;

/// Hard failures of a form-flow operation.
///
/// Collaborator, validation and apply failures during a turn are not here:
/// they are recovered into a [`TurnResponse`](formflow_contract::TurnResponse)
/// carrying an `error` metadata entry.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The form's submit side effect failed; phase stays `Confirming`.
    #[error("failed to submit form: {0}")]
    Submit(#[source] CollaboratorError),

    /// State or history persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The caller's cancellation token fired; nothing was committed.
    #[error("turn cancelled")]
    Cancelled,

    /// The conversation already reached a terminal phase.
    #[error("conversation is closed (phase: {0})")]
    ConversationClosed(Phase),

    /// A checkpoint could not be encoded, decoded or is incompatible.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Prefilled values could not be turned into a valid patch.
    #[error("failed to apply initial values: {0}")]
    Seed(#[from] PatchError),
}
