use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by an external collaborator (classifier, generator,
/// form spec side effect).
#[derive(Debug, Error)]
#[error("{collaborator}: {source}")]
pub struct CollaboratorError {
    /// Which collaborator failed, e.g. `"patch_generator"`.
    pub collaborator: String,
    #[source]
    pub source: BoxError,
}

impl CollaboratorError {
    /// Wrap an error from `collaborator`.
    pub fn new(collaborator: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            collaborator: collaborator.into(),
            source: source.into(),
        }
    }

    /// Build an error from a plain message.
    pub fn msg(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(collaborator, message.into())
    }
}
