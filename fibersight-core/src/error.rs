//! Error types for panel registration.

use thiserror::Error;

/// Misuse of the panel registry by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    /// A live service already exists for this panel.
    #[error("Panel already registered: {0}")]
    AlreadyRegistered(String),

    /// No service is registered for this panel.
    #[error("Unknown panel: {0}")]
    NotFound(String),
}
