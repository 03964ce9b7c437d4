use gem_engine::{ComponentKind, DataNotFound, EcsError, EntityId, Position};
use thiserror::Error;

/// Hard failures: a broken invariant or missing data. Soft conditions
/// (too weak, too far, full) are reported as alerts instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),
    #[error("component {kind:?} not found on entity {id}")]
    ComponentNotFound { id: EntityId, kind: ComponentKind },
    #[error("no path for {id} from {from} to {to}")]
    PathNotFound {
        id: EntityId,
        from: Position,
        to: Position,
    },
    #[error("invalid request state for {id}: {reason}")]
    InvalidRequestState { id: EntityId, reason: String },
    #[error(transparent)]
    DataNotFound(#[from] DataNotFound),
    #[error("entity id already registered: {0}")]
    DuplicateEntity(EntityId),
}

impl SimError {
    pub(crate) fn invalid_state(id: &EntityId, reason: impl Into<String>) -> Self {
        Self::InvalidRequestState {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

impl From<EcsError> for SimError {
    fn from(error: EcsError) -> Self {
        match error {
            EcsError::EntityNotFound(id) => Self::EntityNotFound(id),
            EcsError::ComponentNotFound { id, kind } => Self::ComponentNotFound { id, kind },
            EcsError::DuplicateEntity(id) => Self::DuplicateEntity(id),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
