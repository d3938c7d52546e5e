/// Error taxonomy for the host capability surface
use crate::tab_data::{GroupId, TabId};
use thiserror::Error;

/// Failures reported by the browser host.
///
/// Only [`HostError::EditInProgress`] is transient: the host rejects group
/// mutations that race with another in-flight edit on the same window, and
/// callers are expected to retry those. Everything else is permanent from
/// the caller's point of view.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The host's "Tabs cannot be edited right now" conflict class.
    #[error("tabs cannot be edited right now: {0}")]
    EditInProgress(String),

    #[error("no tab with id {0}")]
    NoSuchTab(TabId),

    #[error("no group with id {0}")]
    NoSuchGroup(GroupId),

    /// Key-value persistence failure. Degrades durability, not correctness:
    /// in-memory state keeps serving the session.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl HostError {
    /// Whether the retry executor should retry after this error.
    pub fn is_transient_conflict(&self) -> bool {
        matches!(self, HostError::EditInProgress(_))
    }
}
