use thiserror::Error;

/// Error taxonomy shared by the orchestrator, the generator and the collaborator services.
///
/// The variants carry intent, not just a message: `NotFound` and `InvalidState` are per-unit
/// failures that generation recovers from by skipping the unit, while `Collaborator` means a
/// dependency is unavailable and the enclosing run must fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl SimError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn collaborator(msg: impl Into<String>) -> Self {
        Self::Collaborator(msg.into())
    }

    /// Whether generation may recover from this error by skipping the unit that caused it.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidState(_))
    }
}

pub type SimResult<T> = Result<T, SimError>;
