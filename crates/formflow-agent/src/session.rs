use formflow_contract::{Checkpoint, CheckpointError, Phase};
use formflow_state::AllowedPaths;

/// Live state of one conversation.
///
/// A turn only writes to a session once it has completed; failed or
/// cancelled turns leave it as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct Session<T> {
    pub phase: Phase,
    pub form_state: T,
    pub allowed_paths: AllowedPaths,
}

impl<T> Session<T> {
    pub fn new(phase: Phase, form_state: T, allowed_paths: AllowedPaths) -> Self {
        Self {
            phase,
            form_state,
            allowed_paths,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Rebuild a session from a checkpoint, keeping its allow-list.
    pub fn restore(checkpoint: Checkpoint<T>) -> Result<Self, CheckpointError> {
        checkpoint.ensure_compatible()?;
        Ok(Self {
            phase: checkpoint.phase,
            form_state: checkpoint.form_state,
            allowed_paths: checkpoint.allowed_paths.into(),
        })
    }
}

impl<T: Clone> Session<T> {
    /// Bare snapshot; [`FormFlow::checkpoint`](crate::FormFlow::checkpoint)
    /// adds the derived fields.
    pub fn checkpoint(&self) -> Checkpoint<T> {
        Checkpoint::new(self.phase, self.form_state.clone(), self.allowed_paths.to_vec())
    }
}
