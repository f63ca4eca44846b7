use thiserror::Error;

/// Typed failures of the state store.
///
/// Reconciliation cares about the first three: `NotFound` and
/// `AlreadyExists` are routinely tolerated on redelivery, and `Conflict`
/// means a concurrent writer won; the losing call's result is discarded
/// and the next trigger reconciles from fresh state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("key {0} not found")]
    NotFound(String),
    #[error("key {0} already exists")]
    AlreadyExists(String),
    #[error("conflict writing {key}: stored version {stored}, caller version {caller}")]
    Conflict {
        key: String,
        stored: u64,
        caller: u64,
    },
    #[error("codec failure for {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage failure: {0}")]
    Storage(String),
}

impl StateError {
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<StateError>(), Some(StateError::NotFound(_)))
    }

    pub fn is_conflict(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<StateError>(),
            Some(StateError::Conflict { .. })
        )
    }
}
